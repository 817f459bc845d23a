// Extractor seam: one implementation per telemetry source
use crate::extraction::types::{CandidateEvent, SourceKind};

/// Turns one blob of raw remote-command output into candidate events.
///
/// Implementations must be tolerant: a line that does not match the expected
/// pattern is skipped, never an error. Adding a new source means adding a new
/// implementation, not touching shared code.
pub trait Extractor: Send + Sync {
    fn kind(&self) -> SourceKind;
    fn extract(&self, raw: &str) -> Vec<CandidateEvent>;
}
