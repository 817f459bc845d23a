use chrono::Utc;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::acquisition::acquirer::{Acquirer, CommandAcquirer};
use crate::classify::classifier::classify;
use crate::classify::egress::{DnsEgressResolver, EgressCache};
use crate::configuration::config::Config;
use crate::configuration::types::{RetentionConfig, ScheduleConfig};
use crate::enrichment::cache::EnrichmentCache;
use crate::enrichment::geolocation::IpApiClient;
use crate::enrichment::hostname::DnsHostnameResolver;
use crate::enrichment::service::EnrichmentService;
use crate::error_handling::types::PipelineError;
use crate::extraction::{all_extractors, Extractor};
use crate::pipeline::normalize::normalize;
use crate::pipeline::reduction::ReductionEngine;
use crate::query::service::QueryService;
use crate::storage::connection_store::ConnectionStore;
use crate::storage::retention::RetentionEngine;
use crate::storage::types::{ConnectionRecord, RetentionReport};

/// Outcome of one ingestion cycle across all configured sources.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub batch_id: Option<Uuid>,
    pub extracted: usize,
    pub classified: usize,
    pub persisted: u64,
    pub sources_failed: usize,
}

/// Owns the full pipeline and drives it as periodic jobs.
///
/// Single-task cooperative model: ingestion, enrichment and retention
/// interleave through the scheduler but a job never overlaps itself, which
/// is what lets the reduction engine and egress cache stay lock-free.
pub struct Collector {
    store: Arc<ConnectionStore>,
    acquirer: Box<dyn Acquirer>,
    extractors: Vec<Box<dyn Extractor>>,
    egress: EgressCache,
    reduction: ReductionEngine,
    enrichment: EnrichmentService,
    retention: RetentionEngine,
    schedule: ScheduleConfig,
}

impl Collector {
    /// Assemble the production pipeline from configuration.
    pub async fn new(config: Config) -> Result<Self, PipelineError> {
        let store = Arc::new(ConnectionStore::open(&config.database_path).await?);
        let enrichment = EnrichmentService::new(
            Box::new(IpApiClient::new(config.enrichment.geo_endpoint.clone())?),
            Box::new(DnsHostnameResolver::new()),
            EnrichmentCache::load(&config.enrichment.cache_file),
            config.enrichment.clone(),
        );
        Ok(Self {
            store,
            acquirer: Box::new(CommandAcquirer::new(config.acquisition.clone())),
            extractors: all_extractors(),
            egress: EgressCache::new(config.egress_hostname.clone(), Box::new(DnsEgressResolver)),
            reduction: ReductionEngine::new(config.reduction.clone()),
            enrichment,
            retention: RetentionEngine::new(config.retention.clone()),
            schedule: config.schedule.clone(),
        })
    }

    /// Assemble from injected parts; the seam used by tests.
    pub fn with_parts(
        store: Arc<ConnectionStore>,
        acquirer: Box<dyn Acquirer>,
        egress: EgressCache,
        reduction: ReductionEngine,
        enrichment: EnrichmentService,
        retention: RetentionEngine,
        schedule: ScheduleConfig,
    ) -> Self {
        Self {
            store,
            acquirer,
            extractors: all_extractors(),
            egress,
            reduction,
            enrichment,
            retention,
            schedule,
        }
    }

    /// One full ingestion cycle: acquire each source, extract, classify,
    /// normalize, reduce, persist in a single transaction.
    ///
    /// A failing source is skipped and the others still run; malformed lines
    /// never surface past the extractors.
    pub async fn ingest_once(&mut self) -> Result<IngestReport, PipelineError> {
        let batch_id = Uuid::new_v4();
        let ingested_at = Utc::now();
        let egress = self.egress.current().await;
        let mut report = IngestReport {
            batch_id: Some(batch_id),
            ..Default::default()
        };

        let mut normalized: Vec<ConnectionRecord> = Vec::new();
        for extractor in &self.extractors {
            let kind = extractor.kind();
            let raw = match self.acquirer.fetch_raw(kind).await {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("acquisition for {} skipped: {}", kind, e);
                    report.sources_failed += 1;
                    continue;
                }
            };
            let events = extractor.extract(&raw);
            report.extracted += events.len();
            for event in &events {
                if let Some(classified) = classify(event, egress) {
                    report.classified += 1;
                    normalized.push(normalize(event, &classified, ingested_at, batch_id));
                }
            }
        }

        let reduced = self.reduction.reduce(normalized);
        report.persisted = self.store.insert_batch(&reduced).await?;
        info!(
            "ingest {}: {} extracted, {} classified, {} persisted, {} sources failed",
            batch_id, report.extracted, report.classified, report.persisted, report.sources_failed
        );
        Ok(report)
    }

    /// One enrichment cycle under the configured lookup budget.
    pub async fn enrich_once(&mut self) -> usize {
        self.enrichment.enrich_cycle(&self.store).await
    }

    /// Immediate retention run, also reachable through the admin surface.
    pub async fn retention_now(&mut self) -> Result<RetentionReport, PipelineError> {
        Ok(self.retention.run(&self.store).await?)
    }

    pub fn retention_config(&self) -> &RetentionConfig {
        self.retention.config()
    }

    /// Runtime retention update; not persisted across restarts.
    pub fn set_retention_config(&mut self, config: RetentionConfig) {
        info!("retention config updated: {:?}", config);
        self.retention.set_config(config);
    }

    /// Read-side facade sharing this collector's store.
    pub fn query_service(&self) -> QueryService {
        QueryService::new(self.store.clone())
    }

    /// Single pass over every job; used by the `--once` mode.
    pub async fn run_once(&mut self) -> Result<(), PipelineError> {
        self.ingest_once().await?;
        self.enrich_once().await;
        self.retention_now().await?;
        self.shutdown();
        Ok(())
    }

    /// Periodic scheduling loop until ctrl-c.
    pub async fn run(&mut self) -> Result<(), PipelineError> {
        let mut ingest_tick =
            tokio::time::interval(Duration::from_secs(self.schedule.ingest_interval_secs));
        let mut retention_tick =
            tokio::time::interval(Duration::from_secs(self.schedule.retention_interval_secs));
        ingest_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        retention_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ingest_tick.tick() => {
                    if let Err(e) = self.ingest_once().await {
                        error!("ingestion cycle failed: {}", e);
                    }
                    let enriched = self.enrich_once().await;
                    if enriched > 0 {
                        info!("enriched {} addresses", enriched);
                    }
                }
                _ = retention_tick.tick() => {
                    if let Err(e) = self.retention_now().await {
                        error!("retention run failed: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested");
                    break;
                }
            }
        }
        self.shutdown();
        Ok(())
    }

    /// Flush durable enrichment state; safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if let Err(e) = self.enrichment.flush() {
            warn!("enrichment cache flush on shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::acquirer::StaticAcquirer;
    use crate::classify::egress::EgressResolver;
    use crate::configuration::types::{EnrichmentConfig, ReductionConfig};
    use crate::enrichment::geolocation::GeoProvider;
    use crate::enrichment::hostname::HostnameResolver;
    use crate::error_handling::types::EnrichmentError;
    use crate::extraction::types::SourceKind;
    use crate::query::service::EndpointQueryParams;
    use crate::storage::types::{Direction, GeolocationRecord};
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};
    use tempfile::TempDir;

    struct FixedEgress(Ipv4Addr);

    #[async_trait]
    impl EgressResolver for FixedEgress {
        async fn resolve(&self, _hostname: &str) -> Option<Ipv4Addr> {
            Some(self.0)
        }
    }

    struct NoGeo;

    #[async_trait]
    impl GeoProvider for NoGeo {
        async fn lookup(&self, address: &str) -> Result<GeolocationRecord, EnrichmentError> {
            Err(EnrichmentError::LookupFailed(address.to_string()))
        }
    }

    struct NoDns;

    #[async_trait]
    impl HostnameResolver for NoDns {
        async fn reverse(&self, address: IpAddr) -> Result<String, EnrichmentError> {
            Err(EnrichmentError::LookupFailed(address.to_string()))
        }
    }

    async fn collector_with(acquirer: StaticAcquirer) -> Collector {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("collector.sqlite3");
        let cache = dir.path().join("cache.json");
        Box::leak(Box::new(dir));
        let store = Arc::new(ConnectionStore::open(path).await.unwrap());
        let enrichment = EnrichmentService::new(
            Box::new(NoGeo),
            Box::new(NoDns),
            EnrichmentCache::load(&cache),
            EnrichmentConfig {
                request_delay_ms: 0,
                cache_file: cache,
                ..Default::default()
            },
        );
        Collector::with_parts(
            store,
            Box::new(acquirer),
            EgressCache::new(
                "gw.example.net".into(),
                Box::new(FixedEgress("99.182.4.194".parse().unwrap())),
            ),
            ReductionEngine::new(ReductionConfig::default()),
            enrichment,
            RetentionEngine::new(RetentionConfig::default()),
            ScheduleConfig::default(),
        )
    }

    #[tokio::test]
    async fn connection_log_blob_flows_to_storage() {
        let acquirer = StaticAcquirer::new().with_blob(
            SourceKind::ConnectionLog,
            "2024-03-01T10:00:00Z session 99.182.4.105 192.168.86.105\n",
        );
        let mut collector = collector_with(acquirer).await;
        let report = collector.ingest_once().await.unwrap();
        assert_eq!(report.persisted, 1);
        assert_eq!(report.sources_failed, 4);

        let results = collector
            .query_service()
            .raw_history(Default::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        let record = &results[0].record;
        assert_eq!(record.external_addr.to_string(), "99.182.4.105");
        assert_eq!(record.local_addr.as_deref(), Some("192.168.86.105"));
        assert_eq!(record.direction, Direction::Inbound);
        assert_eq!(record.source_kind, SourceKind::ConnectionLog);
    }

    #[tokio::test]
    async fn conntrack_outbound_scenario() {
        let acquirer = StaticAcquirer::new().with_blob(
            SourceKind::Conntrack,
            "ipv4 2 tcp 6 100 ESTABLISHED src=192.168.1.10 dst=8.8.8.8 sport=50000 dport=443 packets=3 bytes=300 src=8.8.8.8 dst=99.182.4.194 sport=443 dport=50000 packets=2 bytes=900 [ASSURED]\n",
        );
        let mut collector = collector_with(acquirer).await;
        collector.ingest_once().await.unwrap();
        let results = collector
            .query_service()
            .raw_history(Default::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.direction, Direction::Outbound);
        assert_eq!(results[0].record.external_addr.to_string(), "8.8.8.8");
        assert_eq!(results[0].record.orig_bytes, 300);
    }

    #[tokio::test]
    async fn self_traffic_against_egress_is_dropped() {
        let acquirer = StaticAcquirer::new().with_blob(
            SourceKind::SocketTable,
            "tcp 0 0 192.168.1.5:50000 99.182.4.194:443 ESTABLISHED\n",
        );
        let mut collector = collector_with(acquirer).await;
        let report = collector.ingest_once().await.unwrap();
        assert_eq!(report.extracted, 1);
        assert_eq!(report.classified, 0);
        assert_eq!(report.persisted, 0);
    }

    #[tokio::test]
    async fn repeated_ingest_of_same_blob_is_idempotent() {
        let blob = "Mar  1 02:11:54 gw kernel: DROP IN=eth0 SRC=45.148.10.72 DST=192.168.86.1 SPT=44012 DPT=23\n";
        let acquirer = StaticAcquirer::new().with_blob(SourceKind::ProbeLog, blob);
        let mut collector = collector_with(acquirer).await;
        let first = collector.ingest_once().await.unwrap();
        assert_eq!(first.persisted, 1);
        // same timestamps, same key: the second pass inserts nothing
        let second = collector.ingest_once().await.unwrap();
        assert_eq!(second.persisted, 0);
    }

    #[tokio::test]
    async fn aggregation_sees_multiple_sources() {
        let acquirer = StaticAcquirer::new()
            .with_blob(
                SourceKind::SocketTable,
                "tcp 0 0 192.168.1.5:50000 8.8.8.8:443 ESTABLISHED\n",
            )
            .with_blob(SourceKind::VpnPeer, "  endpoint: 203.0.113.5:51820\n");
        let mut collector = collector_with(acquirer).await;
        collector.ingest_once().await.unwrap();
        let summaries = collector
            .query_service()
            .aggregated_endpoints(EndpointQueryParams::default())
            .await
            .unwrap();
        assert_eq!(summaries.len(), 2);
    }

    #[tokio::test]
    async fn run_once_completes_full_pass() {
        let acquirer = StaticAcquirer::new().with_blob(
            SourceKind::ConnectionLog,
            "2024-03-01T10:00:00Z session 99.182.4.105 192.168.86.105\n",
        );
        let mut collector = collector_with(acquirer).await;
        collector.run_once().await.unwrap();
        let stats = collector.query_service().stats().await.unwrap();
        assert_eq!(stats.connection_rows, 1);
    }

    #[tokio::test]
    async fn retention_config_is_mutable_at_runtime() {
        let mut collector = collector_with(StaticAcquirer::new()).await;
        let mut cfg = collector.retention_config().clone();
        cfg.max_age_days = 7;
        collector.set_retention_config(cfg);
        assert_eq!(collector.retention_config().max_age_days, 7);
    }
}
