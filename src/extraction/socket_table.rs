use log::debug;
use regex::Regex;
use std::net::Ipv4Addr;

use crate::extraction::extractor_trait::Extractor;
use crate::extraction::types::{CandidateEvent, SourceKind};

/// Extractor for netstat/ss style socket table dumps.
///
/// Expected row shape:
///
/// ```text
/// tcp   0   0 192.168.1.5:443     8.8.8.8:51000    ESTABLISHED
/// tcp   0   0 0.0.0.0:22          0.0.0.0:*        LISTEN
/// ```
///
/// The local column is reported as the event source, the remote column as the
/// destination. Wildcard remotes (`0.0.0.0:*`) survive extraction; the
/// classifier is responsible for rejecting the zero address.
pub struct SocketTableExtractor {
    row_re: Regex,
}

impl SocketTableExtractor {
    pub fn new() -> Self {
        Self {
            row_re: Regex::new(
                r"^(?:tcp|udp)\S*\s+\d+\s+\d+\s+(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d+|\*)\s+(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d+|\*)\s+(\S+)",
            )
            .unwrap(),
        }
    }

    fn parse_port(token: &str) -> Option<u16> {
        token.parse().ok()
    }
}

impl Default for SocketTableExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for SocketTableExtractor {
    fn kind(&self) -> SourceKind {
        SourceKind::SocketTable
    }

    fn extract(&self, raw: &str) -> Vec<CandidateEvent> {
        let mut events = Vec::new();
        for line in raw.lines() {
            let line = line.trim();
            let caps = match self.row_re.captures(line) {
                Some(c) => c,
                None => {
                    if !line.is_empty() {
                        debug!("socket table row skipped: {}", line);
                    }
                    continue;
                }
            };
            let local: Ipv4Addr = match caps[1].parse() {
                Ok(a) => a,
                Err(_) => continue,
            };
            let remote: Ipv4Addr = match caps[3].parse() {
                Ok(a) => a,
                Err(_) => continue,
            };
            let mut event = CandidateEvent::new(SourceKind::SocketTable, local);
            event.dst = Some(remote);
            event.src_port = Self::parse_port(&caps[2]);
            event.dst_port = Self::parse_port(&caps[4]);
            event.state = Some(caps[5].to_string());
            // Established rows in the socket table belong to sockets this
            // host opened; listeners are waiting for the remote side.
            event.locally_originated = !caps[5].eq_ignore_ascii_case("LISTEN");
            event.detail = line.to_string();
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
Active Internet connections (w/o servers)
Proto Recv-Q Send-Q Local Address           Foreign Address         State
tcp        0      0 192.168.1.5:51000       3.3.3.3:443             ESTABLISHED
tcp6       0      0 :::22                   :::*                    LISTEN
tcp        0      0 0.0.0.0:22              0.0.0.0:*               LISTEN
udp        0      0 192.168.1.5:68          192.168.1.1:67          ESTABLISHED
";

    #[test]
    fn extracts_rows_with_ports_and_state() {
        let ex = SocketTableExtractor::new();
        let events = ex.extract(DUMP);
        assert_eq!(events.len(), 3);
        let first = &events[0];
        assert_eq!(first.src, "192.168.1.5".parse::<Ipv4Addr>().unwrap());
        assert_eq!(first.src_port, Some(51000));
        assert_eq!(first.dst, Some("3.3.3.3".parse().unwrap()));
        assert_eq!(first.dst_port, Some(443));
        assert_eq!(first.state.as_deref(), Some("ESTABLISHED"));
        assert!(first.locally_originated);
    }

    #[test]
    fn wildcard_remote_port_is_none() {
        let ex = SocketTableExtractor::new();
        let events = ex.extract("tcp 0 0 0.0.0.0:22 0.0.0.0:* LISTEN\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].dst_port, None);
        assert_eq!(events[0].state.as_deref(), Some("LISTEN"));
        assert!(!events[0].locally_originated);
    }

    #[test]
    fn header_lines_are_skipped() {
        let ex = SocketTableExtractor::new();
        assert!(ex.extract("Proto Recv-Q Send-Q Local Address\n").is_empty());
    }
}
