use async_trait::async_trait;
use log::debug;
use std::net::IpAddr;
use std::time::Duration;
use trust_dns_resolver::TokioAsyncResolver;

use crate::error_handling::types::EnrichmentError;

/// Reverse-DNS lookup, independent of geolocation.
#[async_trait]
pub trait HostnameResolver: Send + Sync {
    async fn reverse(&self, address: IpAddr) -> Result<String, EnrichmentError>;
}

/// PTR lookups through trust-dns with a hard timeout; slow resolvers must
/// not stall the enrichment cycle.
pub struct DnsHostnameResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsHostnameResolver {
    pub fn new() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|_| {
            // Fall back to a public resolver when system config is unusable
            use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
            TokioAsyncResolver::tokio(ResolverConfig::google(), ResolverOpts::default())
        });
        Self {
            resolver,
            timeout: Duration::from_millis(2000),
        }
    }
}

impl Default for DnsHostnameResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostnameResolver for DnsHostnameResolver {
    async fn reverse(&self, address: IpAddr) -> Result<String, EnrichmentError> {
        let lookup = self.resolver.reverse_lookup(address);
        let result = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| {
                debug!("reverse lookup timeout for {}", address);
                EnrichmentError::LookupFailed(address.to_string())
            })?
            .map_err(|_| EnrichmentError::LookupFailed(address.to_string()))?;
        result
            .iter()
            .next()
            .map(|name| name.to_string().trim_end_matches('.').to_string())
            .ok_or_else(|| EnrichmentError::LookupFailed(address.to_string()))
    }
}
