//! Persistence subsystem
//!
//! Durable sqlite store for connection and geolocation records, plus the
//! retention algorithms that bound its growth.
//!
//! Components:
//! - `types`: canonical record shapes, filters and reports.
//! - `connection_store`: sqlx-backed sqlite implementation.
//! - `retention`: age/size/orphan sweeps and compaction.

pub mod connection_store;
pub mod retention;
pub mod types;

pub use connection_store::ConnectionStore;
pub use retention::RetentionEngine;
pub use types::{
    ConnectionRecord, Direction, EndpointFilter, EndpointSummary, GeolocationRecord, HistoryEntry,
    HistoryFilter, RetentionReport, StoreStats,
};
