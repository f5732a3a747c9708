use std::sync::Arc;

use async_trait::async_trait;
use hickory_resolver::{Resolver, TokioResolver};

#[cfg(test)]
use mockall::automock;

use crate::error::VpcError;

/// Default domain that VPC information is published under
pub const DEFAULT_DOMAIN: &str = "vpcinfo.local";

/// TXT resolver abstraction for testing
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TxtResolver: Send + Sync + 'static {
    /// Lookup the TXT records of `name`, one string per record
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, VpcError>;
}

/// Production TXT resolver using the system resolver configuration
pub struct SystemTxtResolver {
    resolver: TokioResolver,
}

impl SystemTxtResolver {
    /// Build a resolver from the system DNS configuration
    ///
    /// # Returns
    /// * `Ok(SystemTxtResolver)` - Resolver ready for lookups
    /// * `Err(VpcError)` - If the system configuration cannot be read
    pub fn new() -> Result<Self, VpcError> {
        let resolver = Resolver::builder_tokio()
            .map_err(|source| VpcError::ResolverInit {
                source: Arc::new(source),
            })?
            .build();

        Ok(Self { resolver })
    }
}

#[async_trait]
impl TxtResolver for SystemTxtResolver {
    /// Lookup TXT records of a DNS name
    ///
    /// A TXT record may be split into several character strings on the wire;
    /// they are concatenated back into one string per record.
    ///
    /// # Examples
    /// ```no_run
    /// use vpcinfo::net::{SystemTxtResolver, TxtResolver};
    ///
    /// # async fn example() {
    /// let resolver = SystemTxtResolver::new().unwrap();
    /// let records = resolver.lookup_txt("subnets.vpcinfo.local").await.unwrap();
    /// # }
    /// ```
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, VpcError> {
        let response = self
            .resolver
            .txt_lookup(name)
            .await
            .map_err(|source| VpcError::TxtLookup {
                name: name.to_string(),
                source: Arc::new(source),
            })?;

        let records = response
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk))
                    .collect::<String>()
            })
            .collect();

        Ok(records)
    }
}

/// Wrap `resolver` so that `domain` is appended to every name it looks up
///
/// The domain is normalized to start with a dot, and a trailing dot on the
/// looked up name is dropped. An empty name queries the domain itself. An
/// empty domain returns `resolver` unchanged.
pub fn resolver_with_domain(domain: &str, resolver: Arc<dyn TxtResolver>) -> Arc<dyn TxtResolver> {
    if domain.is_empty() {
        return resolver;
    }

    let domain = if domain.starts_with('.') {
        domain.to_string()
    } else {
        format!(".{domain}")
    };

    Arc::new(DomainResolver { resolver, domain })
}

struct DomainResolver {
    resolver: Arc<dyn TxtResolver>,
    domain: String,
}

impl DomainResolver {
    fn qualify(&self, name: &str) -> String {
        let name = name.strip_suffix('.').unwrap_or(name);
        if name.is_empty() {
            self.domain[1..].to_string()
        } else {
            format!("{name}{}", self.domain)
        }
    }
}

#[async_trait]
impl TxtResolver for DomainResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, VpcError> {
        self.resolver.lookup_txt(&self.qualify(name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn somewhere_here() -> Arc<dyn TxtResolver> {
        let mut inner = MockTxtResolver::new();
        inner.expect_lookup_txt().returning(|name| {
            let records: &[&str] = match name {
                "name-1.somewhere.here" => &["A", "B", "C"],
                "name-2.somewhere.here" => &["1", "2", "3"],
                "name-3.somewhere.else" => &["1", "2", "3"],
                "somewhere.here" => &["subnets=subnets"],
                _ => &[],
            };
            Ok(records.iter().map(|r| r.to_string()).collect())
        });
        Arc::new(inner)
    }

    #[rstest]
    #[case("somewhere.here", "name-1", &["A", "B", "C"])]
    #[case("somewhere.here", "name-2", &["1", "2", "3"])]
    #[case("somewhere.here", "name-3", &[])]
    #[case(".somewhere.here", "name-1", &["A", "B", "C"])]
    #[case("somewhere.here", "name-1.", &["A", "B", "C"])]
    #[case("somewhere.here", "", &["subnets=subnets"])]
    #[tokio::test]
    async fn test_resolver_with_domain(
        #[case] domain: &str,
        #[case] name: &str,
        #[case] expected: &[&str],
    ) {
        let resolver = resolver_with_domain(domain, somewhere_here());
        let records = resolver.lookup_txt(name).await.unwrap();
        assert_eq!(records, expected);
    }

    #[tokio::test]
    async fn test_empty_domain_keeps_names() {
        let mut inner = MockTxtResolver::new();
        inner
            .expect_lookup_txt()
            .times(1)
            .returning(|name| Ok(vec![name.to_string()]));

        let resolver = resolver_with_domain("", Arc::new(inner));
        let records = resolver.lookup_txt("subnets").await.unwrap();
        assert_eq!(records, vec!["subnets".to_string()]);
    }

    #[tokio::test]
    async fn test_errors_are_passed_through() {
        let mut inner = MockTxtResolver::new();
        inner.expect_lookup_txt().returning(|name| {
            Err(VpcError::UnknownEndpoint {
                name: name.to_string(),
            })
        });

        let resolver = resolver_with_domain(DEFAULT_DOMAIN, Arc::new(inner));
        let err = resolver.lookup_txt("zones").await.unwrap_err();
        assert!(matches!(
            err,
            VpcError::UnknownEndpoint { name } if name == "zones.vpcinfo.local"
        ));
    }
}
