use regex::Regex;
use std::net::Ipv4Addr;

use crate::extraction::extractor_trait::Extractor;
use crate::extraction::types::{CandidateEvent, SourceKind};

/// Extractor for tunnel peer listings (`wg show` style).
///
/// Only endpoint lines matter; everything else in the listing (keys,
/// allowed-ips, transfer totals) is ignored. Peers are dialed from the
/// gateway, so events are flagged as locally originated.
pub struct VpnPeerExtractor {
    endpoint_re: Regex,
}

impl VpnPeerExtractor {
    pub fn new() -> Self {
        Self {
            endpoint_re: Regex::new(
                r"endpoint[:=]?\s*(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d+)",
            )
            .unwrap(),
        }
    }
}

impl Default for VpnPeerExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for VpnPeerExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::VpnPeer
    }

    fn extract(&self, raw: &str) -> Vec<CandidateEvent> {
        let mut events = Vec::new();
        for line in raw.lines() {
            let caps = match self.endpoint_re.captures(line) {
                Some(c) => c,
                None => continue,
            };
            let addr: Ipv4Addr = match caps[1].parse() {
                Ok(a) => a,
                Err(_) => continue,
            };
            let mut event = CandidateEvent::new(SourceKind::VpnPeer, addr);
            event.src_port = caps[2].parse().ok();
            event.locally_originated = true;
            event.state = Some("tunnel".to_string());
            event.detail = line.trim().to_string();
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
peer: dGhpcyBpcyBub3QgYSByZWFsIGtleQo=
  endpoint: 203.0.113.5:51820
  allowed ips: 10.9.0.2/32
  latest handshake: 14 seconds ago
  transfer: 1.21 GiB received, 98.56 MiB sent

peer: YW5vdGhlciBmYWtlIGtleSBoZXJlCg==
  endpoint: 198.51.100.44:51820
";

    #[test]
    fn extracts_peer_endpoints() {
        let ex = VpnPeerExtractor::new();
        let events = ex.extract(LISTING);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].src, "203.0.113.5".parse::<Ipv4Addr>().unwrap());
        assert_eq!(events[0].src_port, Some(51820));
        assert!(events[0].locally_originated);
        assert_eq!(events[1].src, "198.51.100.44".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn listing_without_endpoints_yields_nothing() {
        let ex = VpnPeerExtractor::new();
        assert!(ex.extract("peer: abc\n  allowed ips: 10.9.0.2/32\n").is_empty());
    }
}
