use crate::error::VpcError;
use crate::registry::RegistryConfig;

use super::args::Args;
use super::config::ConfigFile;

/// Merge registry settings from command line arguments and config file
pub struct RegistryLoader;

impl RegistryLoader {
    /// Load the registry configuration for the CLI
    ///
    /// Starts from [`RegistryConfig::recommended`]; the config file overrides
    /// it and command line flags override both.
    pub fn load(args: &Args) -> Result<RegistryConfig, VpcError> {
        let mut config = RegistryConfig::recommended();

        if let Some(config_path) = args.config.as_ref() {
            ConfigFile::load(config_path)?.apply(&mut config);
        }

        if let Some(domain) = &args.domain {
            config.domain = domain.clone();
        }
        if let Some(ttl) = args.ttl {
            config.ttl = ttl;
        }
        if let Some(timeout) = args.timeout {
            config.timeout = Some(timeout);
        }

        Ok(config)
    }
}
