use thiserror::Error;

use std::{io, path::PathBuf, sync::Arc, time::Duration};

use hickory_resolver::ResolveError;

/// Errors produced while resolving VPC information.
///
/// Cached failures are handed to every caller of a cache, so the error is
/// `Clone`; sources that are not `Clone` themselves are shared behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum VpcError {
    #[error("failed to initialize DNS resolver: {source}")]
    ResolverInit {
        #[source]
        source: Arc<ResolveError>,
    },

    #[error("failed to lookup TXT records of {name}: {source}")]
    TxtLookup {
        name: String,
        #[source]
        source: Arc<ResolveError>,
    },

    #[error("no endpoint published for vpc resource {name}")]
    UnknownEndpoint { name: String },

    #[error("invalid record '{record}': {reason}")]
    InvalidRecord { record: String, reason: String },

    #[error("failed to read platform marker {path}: {source}")]
    PlatformDetect {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("failed to query instance metadata at {url}: {source}")]
    Metadata {
        url: String,
        #[source]
        source: Arc<reqwest::Error>,
    },

    #[error("instance metadata at {url} answered with status {status}")]
    MetadataStatus { url: String, status: u16 },

    #[error("{what} lookup timed out after {limit:?}")]
    Timeout { what: &'static str, limit: Duration },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: Arc<toml::de::Error>,
    },

    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
}

impl VpcError {
    /// Returns true when the error comes from the environment refusing access,
    /// e.g. platform markers readable by root only.
    pub fn is_permission_denied(&self) -> bool {
        match self {
            VpcError::PlatformDetect { source, .. } | VpcError::Io(source) => {
                source.kind() == io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }
}

impl From<io::Error> for VpcError {
    fn from(err: io::Error) -> Self {
        VpcError::Io(Arc::new(err))
    }
}
