use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Telemetry source that produced a candidate event. Drives reduction-policy
/// selection and the human-readable detail strings downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    ConnectionLog,
    SocketTable,
    Conntrack,
    VpnPeer,
    ProbeLog,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::ConnectionLog => "connection_log",
            SourceKind::SocketTable => "socket_table",
            SourceKind::Conntrack => "conntrack",
            SourceKind::VpnPeer => "vpn_peer",
            SourceKind::ProbeLog => "probe_log",
        }
    }

    pub fn from_str(s: &str) -> Option<SourceKind> {
        match s {
            "connection_log" => Some(SourceKind::ConnectionLog),
            "socket_table" => Some(SourceKind::SocketTable),
            "conntrack" => Some(SourceKind::Conntrack),
            "vpn_peer" => Some(SourceKind::VpnPeer),
            "probe_log" => Some(SourceKind::ProbeLog),
            _ => None,
        }
    }

    pub fn all() -> &'static [SourceKind] {
        &[
            SourceKind::ConnectionLog,
            SourceKind::SocketTable,
            SourceKind::Conntrack,
            SourceKind::VpnPeer,
            SourceKind::ProbeLog,
        ]
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Loosely-typed event produced by an extractor, before classification.
///
/// Not every source fills every field: the connection log only has an address
/// pair, the socket table adds ports and a state, conntrack adds the reply
/// tuple and counters. Absent fields stay `None`/0 and the normalizer maps
/// them onto record defaults.
#[derive(Debug, Clone)]
pub struct CandidateEvent {
    pub kind: SourceKind,
    pub timestamp: Option<DateTime<Utc>>,
    pub src: Ipv4Addr,
    pub dst: Option<Ipv4Addr>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    /// Reply-direction tuple, only present for conntrack entries.
    pub reply_src: Option<Ipv4Addr>,
    pub reply_dst: Option<Ipv4Addr>,
    pub state: Option<String>,
    pub orig_packets: u64,
    pub orig_bytes: u64,
    pub reply_packets: u64,
    pub reply_bytes: u64,
    /// Extractor hint that the connection was initiated from inside the
    /// network (e.g. a VPN peer we dialed out to).
    pub locally_originated: bool,
    pub detail: String,
}

impl CandidateEvent {
    pub fn new(kind: SourceKind, src: Ipv4Addr) -> Self {
        Self {
            kind,
            timestamp: None,
            src,
            dst: None,
            src_port: None,
            dst_port: None,
            reply_src: None,
            reply_dst: None,
            state: None,
            orig_packets: 0,
            orig_bytes: 0,
            reply_packets: 0,
            reply_bytes: 0,
            locally_originated: false,
            detail: String::new(),
        }
    }
}
