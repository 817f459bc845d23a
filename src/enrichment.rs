//! Enrichment subsystem
//!
//! Bounded-rate geolocation and reverse-hostname lookups with a persistent
//! cache and failure memoization.

pub mod cache;
pub mod geolocation;
pub mod hostname;
pub mod service;

pub use cache::EnrichmentCache;
pub use geolocation::{GeoProvider, IpApiClient};
pub use hostname::{DnsHostnameResolver, HostnameResolver};
pub use service::EnrichmentService;
