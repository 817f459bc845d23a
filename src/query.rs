//! Aggregation query service
//!
//! Read-side queries over the persisted records: per-endpoint rollups with
//! joined geolocation, raw history, and admin statistics.

pub mod service;

pub use service::{
    EndpointQueryParams, HistoryQueryParams, QueryService, DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT,
};
