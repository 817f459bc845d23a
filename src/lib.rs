//! Home gateway network telemetry collector.
//!
//! Periodically acquires raw connection telemetry from a gateway (session
//! logs, socket tables, conntrack dumps, VPN peer listings, probe logs),
//! extracts and classifies external endpoints, reduces the noise, and keeps
//! a bounded sqlite history enriched with geolocation and hostnames.

pub mod acquisition;
pub mod classify;
pub mod configuration;
pub mod enrichment;
pub mod error_handling;
pub mod extraction;
pub mod pipeline;
pub mod query;
pub mod storage;
