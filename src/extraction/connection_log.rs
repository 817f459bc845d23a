use log::debug;
use regex::Regex;
use std::net::Ipv4Addr;

use crate::extraction::extractor_trait::Extractor;
use crate::extraction::timestamp::parse_line_timestamp;
use crate::extraction::types::{CandidateEvent, SourceKind};

/// Extractor for the gateway's session/connection log.
///
/// Lines are timestamped free text carrying exactly two dotted-quad
/// addresses; which of the two is the LAN side is not positional, so both are
/// handed to the classifier as an unordered pair. Lines with fewer or more
/// than two addresses are skipped.
pub struct ConnectionLogExtractor {
    addr_re: Regex,
}

impl ConnectionLogExtractor {
    pub fn new() -> Self {
        Self {
            addr_re: Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\b").unwrap(),
        }
    }
}

impl Default for ConnectionLogExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for ConnectionLogExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::ConnectionLog
    }

    fn extract(&self, raw: &str) -> Vec<CandidateEvent> {
        let mut events = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let addrs: Vec<Ipv4Addr> = self
                .addr_re
                .find_iter(line)
                .filter_map(|m| m.as_str().parse().ok())
                .collect();
            if addrs.len() != 2 {
                debug!("connection log line skipped ({} addresses): {}", addrs.len(), line);
                continue;
            }
            let mut event = CandidateEvent::new(SourceKind::ConnectionLog, addrs[0]);
            event.dst = Some(addrs[1]);
            event.timestamp = parse_line_timestamp(line);
            event.detail = line.to_string();
            events.push(event);
        }
        events
    }
}
