pub mod endpoints;
pub mod metadata;
pub mod parser;
pub mod resolver;
pub mod subnet;

// Re-export main types and functions
pub use endpoints::Endpoints;
pub use metadata::{DEFAULT_METADATA_URL, MetadataClient};
pub use parser::{Field, Record, parse_record};
pub use resolver::{DEFAULT_DOMAIN, SystemTxtResolver, TxtResolver, resolver_with_domain};
pub use subnet::{Subnet, Subnets};
