//! Ingestion pipeline
//!
//! Glue between acquisition and storage: normalization of classified events
//! into canonical records, noise reduction, and the collector that drives
//! the whole chain on a schedule.
//!
//! Components:
//! - `normalize`: classified event to canonical record conversion.
//! - `reduction`: transient filtering, listener dedup and bucket merging.
//! - `collector`: orchestration and periodic job scheduling.

pub mod collector;
pub mod normalize;
pub mod reduction;

pub use collector::{Collector, IngestReport};
pub use normalize::normalize;
pub use reduction::ReductionEngine;
