use log::debug;
use regex::Regex;
use std::net::Ipv4Addr;

use crate::extraction::extractor_trait::Extractor;
use crate::extraction::types::{CandidateEvent, SourceKind};

/// Extractor for connection-tracking table dumps (`conntrack -L` or
/// `/proc/net/nf_conntrack`).
///
/// Each entry carries two 5-tuples: the original direction first, then the
/// reply direction. Example:
///
/// ```text
/// ipv4 2 tcp 6 431999 ESTABLISHED src=192.168.1.10 dst=8.8.8.8 sport=51000 \
///   dport=443 packets=12 bytes=1200 src=8.8.8.8 dst=99.182.4.194 sport=443 \
///   dport=51000 packets=10 bytes=9000 [ASSURED] mark=0 use=1
/// ```
///
/// Both tuples are preserved so the classifier can derive direction from
/// whether the original or the reply source is internal.
pub struct ConntrackExtractor {
    tuple_re: Regex,
    state_re: Regex,
}

struct Tuple {
    src: Ipv4Addr,
    dst: Ipv4Addr,
    sport: Option<u16>,
    dport: Option<u16>,
    packets: u64,
    bytes: u64,
}

impl ConntrackExtractor {
    pub fn new() -> Self {
        Self {
            tuple_re: Regex::new(
                r"src=(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\s+dst=(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?:\s+sport=(\d+)\s+dport=(\d+))?(?:\s+packets=(\d+)\s+bytes=(\d+))?",
            )
            .unwrap(),
            // conntrack state tokens are upper-case, e.g. ESTABLISHED, TIME_WAIT
            state_re: Regex::new(r"\b([A-Z][A-Z_]{2,})\b").unwrap(),
        }
    }

    fn tuples(&self, line: &str) -> Vec<Tuple> {
        self.tuple_re
            .captures_iter(line)
            .filter_map(|caps| {
                let src: Ipv4Addr = caps[1].parse().ok()?;
                let dst: Ipv4Addr = caps[2].parse().ok()?;
                Some(Tuple {
                    src,
                    dst,
                    sport: caps.get(3).and_then(|m| m.as_str().parse().ok()),
                    dport: caps.get(4).and_then(|m| m.as_str().parse().ok()),
                    packets: caps.get(5).and_then(|m| m.as_str().parse().ok()).unwrap_or(0),
                    bytes: caps.get(6).and_then(|m| m.as_str().parse().ok()).unwrap_or(0),
                })
            })
            .collect()
    }
}

impl Default for ConntrackExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for ConntrackExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::Conntrack
    }

    fn extract(&self, raw: &str) -> Vec<CandidateEvent> {
        let mut events = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let tuples = self.tuples(line);
            if tuples.is_empty() {
                debug!("conntrack entry skipped: {}", line);
                continue;
            }
            let orig = &tuples[0];
            let mut event = CandidateEvent::new(SourceKind::Conntrack, orig.src);
            event.dst = Some(orig.dst);
            event.src_port = orig.sport;
            event.dst_port = orig.dport;
            event.orig_packets = orig.packets;
            event.orig_bytes = orig.bytes;
            if let Some(reply) = tuples.get(1) {
                event.reply_src = Some(reply.src);
                event.reply_dst = Some(reply.dst);
                event.reply_packets = reply.packets;
                event.reply_bytes = reply.bytes;
            }
            event.state = self
                .state_re
                .find(line)
                .map(|m| m.as_str().to_string())
                .filter(|s| s != "ASSURED" && s != "UNREPLIED");
            event.detail = line.to_string();
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: &str = "ipv4 2 tcp 6 431999 ESTABLISHED src=192.168.1.10 dst=8.8.8.8 sport=51000 dport=443 packets=12 bytes=1200 src=8.8.8.8 dst=99.182.4.194 sport=443 dport=51000 packets=10 bytes=9000 [ASSURED] mark=0 use=1";

    #[test]
    fn extracts_both_tuples_and_counters() {
        let ex = ConntrackExtractor::new();
        let events = ex.extract(ENTRY);
        assert_eq!(events.len(), 1);
        let e = &events[0];
        assert_eq!(e.src, "192.168.1.10".parse::<Ipv4Addr>().unwrap());
        assert_eq!(e.dst, Some("8.8.8.8".parse().unwrap()));
        assert_eq!(e.dst_port, Some(443));
        assert_eq!(e.orig_packets, 12);
        assert_eq!(e.orig_bytes, 1200);
        assert_eq!(e.reply_src, Some("8.8.8.8".parse().unwrap()));
        assert_eq!(e.reply_packets, 10);
        assert_eq!(e.reply_bytes, 9000);
        assert_eq!(e.state.as_deref(), Some("ESTABLISHED"));
    }

    #[test]
    fn udp_entry_without_state_token() {
        let ex = ConntrackExtractor::new();
        let raw = "ipv4 2 udp 17 30 src=192.168.1.10 dst=1.1.1.1 sport=40000 dport=53 packets=1 bytes=60 src=1.1.1.1 dst=99.182.4.194 sport=53 dport=40000 packets=1 bytes=120";
        let events = ex.extract(raw);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].state, None);
    }

    #[test]
    fn malformed_entry_is_skipped() {
        let ex = ConntrackExtractor::new();
        assert!(ex.extract("not a conntrack line at all\n").is_empty());
    }
}
