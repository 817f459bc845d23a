use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use uuid::Uuid;

use crate::extraction::types::SourceKind;

/// Traffic direction relative to the local network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Inbound,
    Outbound,
    Unknown,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
            Direction::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Direction> {
        match s {
            "inbound" => Some(Direction::Inbound),
            "outbound" => Some(Direction::Outbound),
            "unknown" => Some(Direction::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Upper bound on the human-readable detail synopsis.
pub const MAX_DETAIL_LEN: usize = 200;

/// One observed external-endpoint interaction.
///
/// Uniqueness key: (external_addr, observed_at, direction, local_addr,
/// external_port). Duplicate arrivals are no-ops at the store. Records are
/// never mutated after insert; only retention sweeps delete them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub external_addr: Ipv4Addr,
    pub observed_at: DateTime<Utc>,
    pub direction: Direction,
    pub source_kind: SourceKind,
    /// Internal peer address, or "WAN" for traffic seen on the egress side.
    pub local_addr: Option<String>,
    pub local_port: Option<u16>,
    pub external_port: Option<u16>,
    pub state: Option<String>,
    pub orig_packets: u64,
    pub orig_bytes: u64,
    pub reply_packets: u64,
    pub reply_bytes: u64,
    pub details: String,
    /// Ingestion batch this record arrived in (provenance).
    pub batch_id: Uuid,
}

/// Cached geolocation enrichment for one external address.
///
/// At most one row per address; `last_updated` is refreshed on every upsert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeolocationRecord {
    pub address: String,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
    pub org: Option<String>,
    pub asn: Option<String>,
    pub hostname: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Outcome of one retention run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetentionReport {
    pub aged_deleted: u64,
    pub sized_deleted: u64,
    pub orphans_deleted: u64,
    pub size_before_mb: f64,
    pub size_after_mb: f64,
}

/// Typed filter for per-endpoint aggregation queries. Built by the query
/// service after validating caller input; the store only ever sees
/// parameterized values.
#[derive(Debug, Clone, Default)]
pub struct EndpointFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub direction: Option<Direction>,
    /// Substring matched across address, hostname, city, country, region,
    /// ISP and organization.
    pub search: Option<String>,
    pub limit: u32,
}

/// Typed filter for raw historical connection queries.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub direction: Option<Direction>,
    pub address: Option<Ipv4Addr>,
    pub limit: u32,
}

/// Per-endpoint rollup produced by the aggregation query service.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    pub external_addr: String,
    pub connection_count: u64,
    pub inbound_count: u64,
    pub outbound_count: u64,
    pub last_seen: DateTime<Utc>,
    pub connection_types: Vec<String>,
    pub directions: Vec<String>,
    pub geolocation: Option<GeolocationRecord>,
}

/// One historical connection joined with its geolocation, if any.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub record: ConnectionRecord,
    pub geolocation: Option<GeolocationRecord>,
}

/// Aggregate statistics for the administrative interface.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub connection_rows: u64,
    pub geolocation_rows: u64,
    pub unique_addresses: u64,
    pub db_size_mb: f64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}
