use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{error::VpcError, registry::RegistryConfig};

/// Registry settings read from a TOML file, every key is optional
///
/// ```toml
/// domain = "vpcinfo.local"
/// ttl = "1m"
/// timeout = "2s"
/// metadata_url = "http://169.254.169.254/latest/meta-data/placement/availability-zone"
/// platform_markers = ["/sys/hypervisor/uuid"]
/// ```
#[derive(Debug, Deserialize, Serialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default, with = "humantime_serde")]
    pub ttl: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub metadata_url: Option<String>,
    #[serde(default)]
    pub platform_markers: Option<Vec<PathBuf>>,
}

impl ConfigFile {
    /// Load configuration file
    pub fn load(path: &Path) -> Result<Self, VpcError> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|source| VpcError::ConfigParse {
            path: PathBuf::from(path),
            source: Arc::new(source),
        })
    }

    /// Override the settings of `config` present in the file
    pub fn apply(&self, config: &mut RegistryConfig) {
        if let Some(domain) = &self.domain {
            config.domain = domain.clone();
        }
        if let Some(ttl) = self.ttl {
            config.ttl = ttl;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = Some(timeout);
        }
        if let Some(url) = &self.metadata_url {
            config.metadata_url = url.clone();
        }
        if let Some(markers) = &self.platform_markers {
            config.platform_markers = markers.clone();
        }
    }
}
