//! Cached access to VPC information.
//!
//! A [`Registry`] owns one [`RefreshingCache`] per resource (endpoints,
//! platform, subnets, zone). Registries are meant to be long-lived: build one
//! at startup and share it, every lookup is served from its caches.

use std::{future::Future, path::PathBuf, sync::Arc, time::Duration};

use crate::{
    cache::RefreshingCache,
    error::VpcError,
    net::{
        DEFAULT_DOMAIN, DEFAULT_METADATA_URL, Endpoints, MetadataClient, Subnet, Subnets,
        SystemTxtResolver, TxtResolver, metadata, parse_record, resolver_with_domain,
    },
    platform::{DEFAULT_PLATFORM_MARKERS, Platform, Zone, detect_platform},
};

/// Default lifetime of cached entries
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Lookup time limit of [`RegistryConfig::recommended`]
pub const RECOMMENDED_TIMEOUT: Duration = Duration::from_secs(2);

/// Bound on the subnet lookup done for the zone when no timeout is configured
const LOCAL_SUBNET_TIMEOUT: Duration = RECOMMENDED_TIMEOUT;

/// Settings of a [`Registry`], read-only once the registry is built
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    /// Domain appended to every TXT lookup of the system resolver
    pub domain: String,
    /// Lifetime of cached entries; they are refreshed after half of it.
    /// Zero falls back to [`DEFAULT_TTL`].
    pub ttl: Duration,
    /// Time limit of each network lookup, `None` for no limit
    pub timeout: Option<Duration>,
    /// Instance metadata URL reporting the availability zone
    pub metadata_url: String,
    /// Files inspected to detect the platform
    pub platform_markers: Vec<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            ttl: DEFAULT_TTL,
            timeout: None,
            metadata_url: DEFAULT_METADATA_URL.to_string(),
            platform_markers: DEFAULT_PLATFORM_MARKERS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl RegistryConfig {
    /// Defaults with lookups bounded by [`RECOMMENDED_TIMEOUT`]
    pub fn recommended() -> Self {
        Self {
            timeout: Some(RECOMMENDED_TIMEOUT),
            ..Default::default()
        }
    }
}

/// VPC information exposed to the program
///
/// Safe to use concurrently from multiple tasks.
pub struct Registry {
    resolver: Arc<dyn TxtResolver>,
    metadata: MetadataClient,
    config: RegistryConfig,
    endpoints: RefreshingCache<Arc<Endpoints>, VpcError>,
    platform: RefreshingCache<Platform, VpcError>,
    subnets: RefreshingCache<Arc<Subnets>, VpcError>,
    zone: RefreshingCache<Zone, VpcError>,
}

impl Registry {
    /// Create a registry resolving TXT records with `resolver` as is
    ///
    /// `config.domain` is not applied here, wrap the resolver with
    /// [`resolver_with_domain`] if needed.
    pub fn new(resolver: Arc<dyn TxtResolver>, config: RegistryConfig) -> Result<Self, VpcError> {
        let metadata = MetadataClient::new(config.metadata_url.clone(), config.timeout)?;

        Ok(Self {
            resolver,
            metadata,
            config,
            endpoints: RefreshingCache::new("endpoints"),
            platform: RefreshingCache::new("platform"),
            subnets: RefreshingCache::new("subnets"),
            zone: RefreshingCache::new("zone"),
        })
    }

    /// Create a registry on top of the system DNS resolver, scoped to `config.domain`
    ///
    /// # Examples
    /// ```no_run
    /// use vpcinfo::{Registry, RegistryConfig};
    ///
    /// # async fn example() {
    /// let registry = Registry::from_config(RegistryConfig::recommended()).unwrap();
    /// let zone = registry.lookup_zone().await.unwrap();
    /// # }
    /// ```
    pub fn from_config(config: RegistryConfig) -> Result<Self, VpcError> {
        let system: Arc<dyn TxtResolver> = Arc::new(SystemTxtResolver::new()?);
        let resolver = resolver_with_domain(&config.domain, system);
        Self::new(resolver, config)
    }

    /// Settings the registry was built with
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Return the platform the program is running on
    pub async fn lookup_platform(&self) -> Result<Platform, VpcError> {
        self.platform
            .get_or_refresh(self.ttl(), || {
                detect_platform(self.config.platform_markers.as_slice())
            })
            .await
    }

    /// Return the list of subnets in the VPC
    ///
    /// Calls may share the same list, it is read-only.
    pub async fn lookup_subnets(&self) -> Result<Arc<Subnets>, VpcError> {
        self.subnets
            .get_or_refresh(self.ttl(), || {
                self.with_timeout("subnets", async {
                    let records = self.lookup_txt("subnets").await?;
                    let subnets = records
                        .iter()
                        .map(|record| parse_record::<Subnet>(record))
                        .collect::<Result<Subnets, _>>()?;
                    Ok::<_, VpcError>(Arc::new(subnets))
                })
            })
            .await
    }

    /// Return the zone the program is running in
    ///
    /// The local subnet is looked up under its own time limit; when DNS does not
    /// answer in time the platform falls back to the metadata service.
    pub async fn lookup_zone(&self) -> Result<Zone, VpcError> {
        self.zone
            .get_or_refresh(self.ttl(), || async {
                let platform = self.lookup_platform().await?;
                let local = self.local_subnet().await;
                self.with_timeout("zone", platform.lookup_zone(local.as_ref(), &self.metadata))
                    .await
            })
            .await
    }

    /// Lookup the TXT records of a VPC resource through the published endpoints
    pub async fn lookup_txt(&self, resource: &str) -> Result<Vec<String>, VpcError> {
        let endpoints = self
            .endpoints
            .get_or_refresh(self.ttl(), || {
                self.with_timeout("endpoints", async {
                    let records = self.resolver.lookup_txt("").await?;
                    Ok::<_, VpcError>(Arc::new(Endpoints::from_records(&records)))
                })
            })
            .await?;

        let name = endpoints
            .get(resource)
            .ok_or_else(|| VpcError::UnknownEndpoint {
                name: resource.to_string(),
            })?;

        self.resolver.lookup_txt(name).await
    }

    /// Subnet holding this host's address, if it can be determined
    async fn local_subnet(&self) -> Option<Subnet> {
        let ip = metadata::local_ip()
            .await
            .inspect_err(|err| log::debug!("cannot determine local address: {err}"))
            .ok()?;
        let limit = self.config.timeout.unwrap_or(LOCAL_SUBNET_TIMEOUT);
        let subnets = tokio::time::timeout(limit, self.lookup_subnets())
            .await
            .unwrap_or_else(|_| {
                Err(VpcError::Timeout {
                    what: "subnets",
                    limit,
                })
            })
            .inspect_err(|err| log::debug!("cannot match local address {ip} to a subnet: {err}"))
            .ok()?;

        subnets.lookup_ip(ip).cloned()
    }

    fn ttl(&self) -> Duration {
        if self.config.ttl.is_zero() {
            DEFAULT_TTL
        } else {
            self.config.ttl
        }
    }

    async fn with_timeout<T>(
        &self,
        what: &'static str,
        lookup: impl Future<Output = Result<T, VpcError>>,
    ) -> Result<T, VpcError> {
        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, lookup)
                .await
                .map_err(|_| VpcError::Timeout { what, limit })?,
            None => lookup.await,
        }
    }
}
