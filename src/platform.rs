use std::{
    fmt, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::VpcError,
    net::{MetadataClient, Subnet},
};

/// Files whose content identifies the hypervisor, checked in order
///
/// See <https://docs.aws.amazon.com/AWSEC2/latest/UserGuide/identify_ec2_instances.html>
pub const DEFAULT_PLATFORM_MARKERS: [&str; 2] = [
    "/sys/devices/virtual/dmi/id/product_uuid",
    "/sys/hypervisor/uuid",
];

/// Infrastructure zone the program runs in, e.g. `us-west-2a`
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Zone(String);

impl Zone {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Zone {
    fn from(zone: String) -> Self {
        Self(zone)
    }
}

impl From<&str> for Zone {
    fn from(zone: &str) -> Self {
        Self(zone.to_string())
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// VPC platform the program is running on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    Aws,
    Unknown,
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Aws => "aws",
            Platform::Unknown => "unknown",
        }
    }

    /// Determine the zone the program is running in
    ///
    /// The zone of `local` (the subnet holding this host's address) is used when
    /// known. Otherwise AWS asks the instance metadata service, and an unknown
    /// platform has no zone to offer.
    pub async fn lookup_zone(
        &self,
        local: Option<&Subnet>,
        metadata: &MetadataClient,
    ) -> Result<Zone, VpcError> {
        if let Some(subnet) = local.filter(|subnet| !subnet.zone.is_empty()) {
            return Ok(Zone::from(subnet.zone.as_str()));
        }

        match self {
            Platform::Aws => metadata.availability_zone().await,
            Platform::Unknown => Ok(Zone::default()),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect the platform from hypervisor marker files
///
/// Missing markers are skipped; any other read failure (typically permission
/// denied) is returned as is.
///
/// # Arguments
/// * `markers` - Files to inspect in order, see [`DEFAULT_PLATFORM_MARKERS`]
pub async fn detect_platform<P: AsRef<Path>>(markers: &[P]) -> Result<Platform, VpcError> {
    for path in markers {
        let path = path.as_ref();
        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(source) => {
                return Err(VpcError::PlatformDetect {
                    path: PathBuf::from(path),
                    source: Arc::new(source),
                });
            }
        };

        if content.starts_with(b"EC2") || content.starts_with(b"ec2") {
            return Ok(Platform::Aws);
        }
    }

    Ok(Platform::Unknown)
}
