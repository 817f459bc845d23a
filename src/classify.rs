//! Endpoint classification
//!
//! Decides which side of a candidate event is the externally routable
//! endpoint, excludes non-routable ranges and the gateway's own egress
//! address, and assigns a traffic direction.

pub mod classifier;
pub mod egress;

pub use classifier::{classify, is_excluded, is_internal, Classified};
pub use egress::{DnsEgressResolver, EgressCache, EgressResolver};
