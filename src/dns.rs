//! DNS mapping checks for new deployments.
//!
//! The routers of a Cloud Foundry deployment answer for its domain, so the
//! domain should resolve to one of the deployment's IP addresses before the
//! deployment is created.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use tracing::debug;

use crate::error::Result;

/// Looks up the addresses a domain resolves to.
#[async_trait]
pub trait DomainResolver: Send + Sync {
    /// Resolves `domain` to its addresses.
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl DomainResolver for SystemResolver {
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>> {
        let addresses = tokio::net::lookup_host((domain, 0)).await?;
        Ok(addresses.map(|addr| addr.ip()).collect())
    }
}

/// Outcome of a DNS mapping check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DnsMapping {
    /// The domain resolves to one of the deployment's addresses.
    Matched {
        /// The matching address.
        address: IpAddr,
    },
    /// The domain resolves, but not to any of the deployment's addresses.
    Mismatched {
        /// Addresses the domain resolved to.
        resolved: Vec<IpAddr>,
    },
    /// The domain could not be resolved.
    Unresolved {
        /// Resolver error.
        reason: String,
    },
}

impl DnsMapping {
    /// Returns true if the domain points at the deployment.
    #[must_use]
    pub const fn is_matched(&self) -> bool {
        matches!(self, Self::Matched { .. })
    }
}

impl fmt::Display for DnsMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched { address } => write!(f, "resolves to {address}"),
            Self::Mismatched { resolved } => {
                let list: Vec<String> = resolved.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "resolves to {}, none of the deployment's ip_addresses",
                    list.join(", ")
                )
            }
            Self::Unresolved { reason } => write!(f, "does not resolve: {reason}"),
        }
    }
}

/// Checks that `domain` resolves to one of `ip_addresses`.
///
/// Resolver failures are reported as [`DnsMapping::Unresolved`] rather than
/// as errors, so the caller decides how strict to be.
pub async fn check_mapping(
    resolver: &dyn DomainResolver,
    domain: &str,
    ip_addresses: &[String],
) -> DnsMapping {
    let expected: Vec<IpAddr> = ip_addresses
        .iter()
        .filter_map(|ip| ip.trim().parse().ok())
        .collect();

    match resolver.resolve(domain).await {
        Ok(resolved) => match resolved.iter().find(|addr| expected.contains(addr)) {
            Some(address) => {
                debug!("{domain} resolves to deployment address {address}");
                DnsMapping::Matched { address: *address }
            }
            None => DnsMapping::Mismatched { resolved },
        },
        Err(e) => DnsMapping::Unresolved {
            reason: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DirectorError;

    struct FixedResolver(Vec<IpAddr>);

    #[async_trait]
    impl DomainResolver for FixedResolver {
        async fn resolve(&self, _domain: &str) -> Result<Vec<IpAddr>> {
            if self.0.is_empty() {
                return Err(DirectorError::network("NXDOMAIN").into());
            }
            Ok(self.0.clone())
        }
    }

    fn ips(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_matching_address() {
        let resolver = FixedResolver(vec!["10.0.0.9".parse().unwrap(), "1.2.3.4".parse().unwrap()]);
        let mapping = check_mapping(&resolver, "mycloud.com", &ips(&["1.2.3.4"])).await;

        assert_eq!(
            mapping,
            DnsMapping::Matched {
                address: "1.2.3.4".parse().unwrap()
            }
        );
        assert!(mapping.is_matched());
    }

    #[tokio::test]
    async fn test_mismatched_address() {
        let resolver = FixedResolver(vec!["5.6.7.8".parse().unwrap()]);
        let mapping = check_mapping(&resolver, "mycloud.com", &ips(&["1.2.3.4"])).await;

        assert!(!mapping.is_matched());
        assert!(mapping.to_string().contains("5.6.7.8"));
    }

    #[tokio::test]
    async fn test_unresolved_domain() {
        let resolver = FixedResolver(Vec::new());
        let mapping = check_mapping(&resolver, "nowhere.invalid", &ips(&["1.2.3.4"])).await;

        match mapping {
            DnsMapping::Unresolved { reason } => assert!(reason.contains("NXDOMAIN")),
            other => panic!("expected an unresolved mapping, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_system_resolver_handles_literal_address() {
        let resolved = SystemResolver.resolve("127.0.0.1").await.unwrap();
        assert_eq!(resolved, vec![IpAddr::from([127, 0, 0, 1])]);
    }
}
