use log::{debug, warn};
use std::net::IpAddr;
use std::time::Duration;

use crate::configuration::types::EnrichmentConfig;
use crate::enrichment::cache::EnrichmentCache;
use crate::enrichment::geolocation::GeoProvider;
use crate::enrichment::hostname::HostnameResolver;
use crate::error_handling::types::EnrichmentError;
use crate::storage::connection_store::ConnectionStore;

/// Lazily enriches unique external addresses under a capped lookup budget.
///
/// Cache first; on miss one external lookup, then the success or a terminal
/// failure marker is persisted so the same address is never retried within a
/// process lifetime. Between lookups the service parks on a scheduling pause
/// rather than a blocking sleep, so retention and ingestion keep running.
pub struct EnrichmentService {
    provider: Box<dyn GeoProvider>,
    resolver: Box<dyn HostnameResolver>,
    cache: EnrichmentCache,
    config: EnrichmentConfig,
}

impl EnrichmentService {
    pub fn new(
        provider: Box<dyn GeoProvider>,
        resolver: Box<dyn HostnameResolver>,
        cache: EnrichmentCache,
        config: EnrichmentConfig,
    ) -> Self {
        Self {
            provider,
            resolver,
            cache,
            config,
        }
    }

    /// One enrichment cycle: look up geolocation for up to `per_cycle_cap`
    /// distinct addresses that have none yet. Returns how many external
    /// lookups were spent.
    pub async fn enrich_cycle(&mut self, store: &ConnectionStore) -> usize {
        // Over-fetch so memoized failures don't eat the whole budget.
        let fetch = (self.config.per_cycle_cap * 2) as u32;
        let candidates = match store.addresses_missing_geolocation(fetch).await {
            Ok(addrs) => addrs,
            Err(e) => {
                warn!("enrichment candidate query failed: {}", e);
                return 0;
            }
        };

        let mut spent = 0usize;
        for address in candidates {
            if spent >= self.config.per_cycle_cap {
                debug!("enrichment budget exhausted for this cycle");
                break;
            }
            if self.cache.geo_failed(&address) {
                continue;
            }
            if spent > 0 {
                // explicit scheduling pause, respects the external rate budget
                tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
            }
            spent += 1;
            match self.provider.lookup(&address).await {
                Ok(mut geo) => {
                    if geo.hostname.is_none() {
                        geo.hostname = self.resolve_hostname(&address).await;
                    } else {
                        self.cache.set_hostname(&address, geo.hostname.clone());
                    }
                    if let Err(e) = store.upsert_geolocation(&geo).await {
                        warn!("failed to persist geolocation for {}: {}", address, e);
                    }
                }
                Err(EnrichmentError::RequestFailed(e)) => {
                    // provider unreachable: stop the cycle, do not memoize
                    warn!("geolocation provider unreachable ({}), ending cycle", e);
                    break;
                }
                Err(e) => {
                    debug!("geolocation lookup failed terminally: {}", e);
                    self.cache.mark_geo_failed(&address);
                }
            }
        }

        if let Err(e) = self.cache.flush() {
            warn!("enrichment cache flush failed: {}", e);
        }
        spent
    }

    /// Reverse-hostname with independent memoization; failures are cached as
    /// None so the resolver is asked once per address.
    async fn resolve_hostname(&mut self, address: &str) -> Option<String> {
        if let Some(cached) = self.cache.hostname(address) {
            return cached;
        }
        let ip: IpAddr = match address.parse() {
            Ok(ip) => ip,
            Err(_) => return None,
        };
        let outcome = match self.resolver.reverse(ip).await {
            Ok(hostname) => Some(hostname),
            Err(e) => {
                debug!("reverse lookup failed for {}: {}", address, e);
                None
            }
        };
        self.cache.set_hostname(address, outcome.clone());
        outcome
    }

    /// Persist the cache artifact; called on shutdown.
    pub fn flush(&mut self) -> Result<(), EnrichmentError> {
        self.cache.flush()
    }

    #[cfg(test)]
    pub fn cache(&self) -> &EnrichmentCache {
        &self.cache
    }
}
