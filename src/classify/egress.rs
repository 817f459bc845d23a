use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use std::net::{IpAddr, Ipv4Addr};
use tokio::net::lookup_host;

/// Resolves the gateway's externally-visible address from a hostname.
#[async_trait]
pub trait EgressResolver: Send + Sync {
    async fn resolve(&self, hostname: &str) -> Option<Ipv4Addr>;
}

/// System resolver via tokio's host lookup.
pub struct DnsEgressResolver;

#[async_trait]
impl EgressResolver for DnsEgressResolver {
    async fn resolve(&self, hostname: &str) -> Option<Ipv4Addr> {
        // lookup_host wants a socket address; the port is discarded
        let target = format!("{}:443", hostname);
        match lookup_host(target).await {
            Ok(addrs) => addrs
                .filter_map(|sa| match sa.ip() {
                    IpAddr::V4(v4) => Some(v4),
                    IpAddr::V6(_) => None,
                })
                .next(),
            Err(e) => {
                debug!("egress resolution failed for {}: {}", hostname, e);
                None
            }
        }
    }
}

/// Single mutable slot holding the resolved egress address.
///
/// Refreshed at most every [`EgressCache::TTL_SECS`]; on resolution failure
/// the last known value is reused rather than failing classification. If no
/// value has ever been resolved, `current()` returns None and ambiguous
/// records are dropped by the classifier.
pub struct EgressCache {
    hostname: String,
    resolver: Box<dyn EgressResolver>,
    slot: Option<(Ipv4Addr, DateTime<Utc>)>,
}

impl EgressCache {
    pub const TTL_SECS: i64 = 300;

    pub fn new(hostname: String, resolver: Box<dyn EgressResolver>) -> Self {
        Self {
            hostname,
            resolver,
            slot: None,
        }
    }

    pub async fn current(&mut self) -> Option<Ipv4Addr> {
        if let Some((addr, expires)) = self.slot {
            if Utc::now() < expires {
                return Some(addr);
            }
        }
        match self.resolver.resolve(&self.hostname).await {
            Some(addr) => {
                self.slot = Some((addr, Utc::now() + Duration::seconds(Self::TTL_SECS)));
                Some(addr)
            }
            None => {
                warn!(
                    "egress address refresh failed for {}, reusing last known value",
                    self.hostname
                );
                self.slot.map(|(addr, _)| addr)
            }
        }
    }
}
