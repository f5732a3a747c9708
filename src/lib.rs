//! VPC information (platform, subnets, zone) resolved from DNS TXT records
//! and served from self-refreshing caches.

pub mod cache;
pub mod cli;
pub mod error;
pub mod net;
pub mod platform;
pub mod registry;

pub use cache::RefreshingCache;
pub use error::VpcError;
pub use net::{Subnet, Subnets};
pub use platform::{Platform, Zone};
pub use registry::{Registry, RegistryConfig};
