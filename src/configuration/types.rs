use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Retention knobs. Process-wide and mutable at runtime through the
/// administrative interface; changes are not persisted across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub max_size_mb: f64,
    pub max_age_days: i64,
    pub cleanup_batch_size: u32,
    pub enable_size_limit: bool,
    pub enable_time_limit: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_size_mb: 512.0,
            max_age_days: 90,
            cleanup_batch_size: 1000,
            enable_size_limit: true,
            enable_time_limit: true,
        }
    }
}

/// Noise-suppression policy knobs for the reduction engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Protocol states dropped as high-frequency/low-value once an endpoint
    /// has been seen.
    pub transient_states: Vec<String>,
    pub listen_dedup_window_secs: i64,
    /// Known chatty external endpoints whose outbound records are merged
    /// into time buckets.
    pub high_volume_addrs: Vec<Ipv4Addr>,
    pub bucket_secs: i64,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            transient_states: vec![
                "TIME_WAIT".into(),
                "CLOSE".into(),
                "CLOSE_WAIT".into(),
                "FIN_WAIT1".into(),
                "FIN_WAIT2".into(),
                "LAST_ACK".into(),
            ],
            listen_dedup_window_secs: 3600,
            high_volume_addrs: Vec::new(),
            bucket_secs: 300,
        }
    }
}

/// External-lookup budget for the enrichment cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Distinct addresses enriched per cycle; the rest wait for a later one.
    pub per_cycle_cap: usize,
    /// Pause between consecutive external lookups.
    pub request_delay_ms: u64,
    /// On-disk cache artifact for hostname results and failure markers.
    pub cache_file: PathBuf,
    /// Geolocation endpoint; the address is appended to this prefix.
    pub geo_endpoint: String,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            per_cycle_cap: 50,
            request_delay_ms: 1500,
            cache_file: PathBuf::from("enrichment_cache.json"),
            geo_endpoint: "http://ip-api.com/json/".into(),
        }
    }
}

/// Periodic job intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub ingest_interval_secs: u64,
    pub retention_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            ingest_interval_secs: 300,
            retention_interval_secs: 3600,
        }
    }
}

/// Raw-text acquisition command per telemetry source. Each is a full shell
/// command line, typically an ssh invocation against the gateway; unset
/// sources are skipped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    pub connection_log: Option<String>,
    pub socket_table: Option<String>,
    pub conntrack: Option<String>,
    pub vpn_peers: Option<String>,
    pub probe_log: Option<String>,
}

impl AcquisitionConfig {
    pub fn configured_sources(&self) -> usize {
        [
            &self.connection_log,
            &self.socket_table,
            &self.conntrack,
            &self.vpn_peers,
            &self.probe_log,
        ]
        .iter()
        .filter(|c| c.is_some())
        .count()
    }
}
