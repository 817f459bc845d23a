use log::debug;
use regex::Regex;
use std::net::Ipv4Addr;

use crate::extraction::extractor_trait::Extractor;
use crate::extraction::timestamp::parse_line_timestamp;
use crate::extraction::types::{CandidateEvent, SourceKind};

/// Keywords that flag a probe/scan line in the auth or kernel log.
const PROBE_KEYWORDS: &[&str] = &[
    "connection attempt",
    "invalid user",
    "failed password",
    "drop",
    "reject",
    "refused",
    "portscan",
];

/// Extractor for probe and scan indicators in free-text logs.
///
/// Unlike the positional extractors, this one flags whole lines by keyword
/// match and then searches the entire line for addresses. Kernel firewall
/// lines with `SRC=`/`DST=` markers get their tuple fields picked out; for
/// anything else the first address found is the probing peer.
pub struct ProbeLogExtractor {
    addr_re: Regex,
    src_re: Regex,
    dst_re: Regex,
    spt_re: Regex,
    dpt_re: Regex,
}

impl ProbeLogExtractor {
    pub fn new() -> Self {
        Self {
            addr_re: Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})\b").unwrap(),
            src_re: Regex::new(r"SRC=(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})").unwrap(),
            dst_re: Regex::new(r"DST=(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})").unwrap(),
            spt_re: Regex::new(r"SPT=(\d+)").unwrap(),
            dpt_re: Regex::new(r"DPT=(\d+)").unwrap(),
        }
    }

    fn flagged(line: &str) -> bool {
        let lower = line.to_lowercase();
        PROBE_KEYWORDS.iter().any(|kw| lower.contains(kw))
    }

    fn first_capture<T: std::str::FromStr>(&self, re: &Regex, line: &str) -> Option<T> {
        re.captures(line).and_then(|c| c[1].parse().ok())
    }
}

impl Default for ProbeLogExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for ProbeLogExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::ProbeLog
    }

    fn extract(&self, raw: &str) -> Vec<CandidateEvent> {
        let mut events = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || !Self::flagged(line) {
                continue;
            }

            let src: Option<Ipv4Addr> = self.first_capture(&self.src_re, line).or_else(|| {
                self.addr_re
                    .find_iter(line)
                    .filter_map(|m| m.as_str().parse().ok())
                    .next()
            });
            let src = match src {
                Some(a) => a,
                None => {
                    debug!("probe line without address skipped: {}", line);
                    continue;
                }
            };

            let mut event = CandidateEvent::new(SourceKind::ProbeLog, src);
            event.dst = self.first_capture(&self.dst_re, line);
            event.src_port = self.first_capture(&self.spt_re, line);
            event.dst_port = self.first_capture(&self.dpt_re, line);
            event.timestamp = parse_line_timestamp(line);
            event.state = Some("probe".to_string());
            event.detail = line.to_string();
            events.push(event);
        }
        events
    }
}
