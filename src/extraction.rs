//! Source extractors
//!
//! One extractor per telemetry source. Each consumes a blob of raw remote
//! command output and yields loosely-typed candidate events; lines that do
//! not match are skipped, never fatal.
//!
//! Components:
//! - `extractor_trait`: the Extractor trait defining the uniform API.
//! - `types`: SourceKind and CandidateEvent shared shapes.
//! - `connection_log`: timestamped lines carrying two dotted quads.
//! - `socket_table`: netstat/ss style local/remote socket rows.
//! - `conntrack`: original/reply 5-tuples with packet and byte counters.
//! - `vpn_peers`: tunnel peer endpoint listings.
//! - `probe_log`: keyword-flagged scan/probe indicators.
//! - `timestamp`: best-effort log-line timestamp recovery.

pub mod conntrack;
pub mod connection_log;
pub mod extractor_trait;
pub mod probe_log;
pub mod socket_table;
pub mod timestamp;
pub mod types;
pub mod vpn_peers;

pub use connection_log::ConnectionLogExtractor;
pub use conntrack::ConntrackExtractor;
pub use extractor_trait::Extractor;
pub use probe_log::ProbeLogExtractor;
pub use socket_table::SocketTableExtractor;
pub use types::{CandidateEvent, SourceKind};
pub use vpn_peers::VpnPeerExtractor;

/// Full extractor set, one per supported source.
pub fn all_extractors() -> Vec<Box<dyn Extractor>> {
    vec![
        Box::new(ConnectionLogExtractor::new()),
        Box::new(SocketTableExtractor::new()),
        Box::new(ConntrackExtractor::new()),
        Box::new(VpnPeerExtractor::new()),
        Box::new(ProbeLogExtractor::new()),
    ]
}
