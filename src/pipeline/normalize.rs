use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::classify::Classified;
use crate::extraction::types::CandidateEvent;
use crate::storage::types::{ConnectionRecord, MAX_DETAIL_LEN};

/// Map a classified candidate event onto the canonical record shape.
///
/// Fields the source never provided stay None/0. Events without their own
/// timestamp get the ingestion time. The detail synopsis is bounded to
/// [`MAX_DETAIL_LEN`] characters.
pub fn normalize(
    event: &CandidateEvent,
    classified: &Classified,
    ingested_at: DateTime<Utc>,
    batch_id: Uuid,
) -> ConnectionRecord {
    ConnectionRecord {
        external_addr: classified.external,
        observed_at: event.timestamp.unwrap_or(ingested_at),
        direction: classified.direction,
        source_kind: event.kind,
        local_addr: classified.local.clone(),
        local_port: classified.local_port,
        external_port: classified.external_port,
        state: event.state.clone(),
        orig_packets: event.orig_packets,
        orig_bytes: event.orig_bytes,
        reply_packets: event.reply_packets,
        reply_bytes: event.reply_bytes,
        details: synopsis(event, classified),
        batch_id,
    }
}

fn synopsis(event: &CandidateEvent, classified: &Classified) -> String {
    let mut out = String::new();
    out.push_str(classified.direction.as_str());
    if let Some(state) = &event.state {
        out.push(' ');
        out.push_str(state);
    }
    match (&classified.local, classified.local_port) {
        (Some(local), Some(port)) => out.push_str(&format!(" via {}:{}", local, port)),
        (Some(local), None) => out.push_str(&format!(" via {}", local)),
        _ => {}
    }
    match classified.external_port {
        Some(port) => out.push_str(&format!(" <-> {}:{}", classified.external, port)),
        None => out.push_str(&format!(" <-> {}", classified.external)),
    }
    let total_bytes = event.orig_bytes + event.reply_bytes;
    if total_bytes > 0 {
        out.push_str(&format!(" ({} bytes)", total_bytes));
    }
    if out.len() > MAX_DETAIL_LEN {
        let mut cut = MAX_DETAIL_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::extraction::types::{CandidateEvent, SourceKind};
    use crate::storage::types::Direction;
    use std::net::Ipv4Addr;

    fn ip(s: &str) -> Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn normalizes_socket_table_event() {
        let mut e = CandidateEvent::new(SourceKind::SocketTable, ip("192.168.1.5"));
        e.dst = Some(ip("3.3.3.3"));
        e.src_port = Some(51000);
        e.dst_port = Some(443);
        e.state = Some("ESTABLISHED".into());
        e.orig_bytes = 12000;
        e.locally_originated = true;
        let c = classify(&e, None).unwrap();
        let now = Utc::now();
        let record = normalize(&e, &c, now, Uuid::new_v4());
        assert_eq!(record.external_addr, ip("3.3.3.3"));
        assert_eq!(record.local_addr.as_deref(), Some("192.168.1.5"));
        assert_eq!(record.external_port, Some(443));
        assert_eq!(record.observed_at, now);
        assert_eq!(record.direction, Direction::Outbound);
        assert!(record.details.contains("ESTABLISHED"));
        assert!(record.details.contains("3.3.3.3:443"));
        assert!(record.details.contains("12000 bytes"));
    }

    #[test]
    fn missing_timestamp_uses_ingestion_time() {
        let mut e = CandidateEvent::new(SourceKind::VpnPeer, ip("203.0.113.5"));
        e.locally_originated = true;
        let c = classify(&e, None).unwrap();
        let now = Utc::now();
        let record = normalize(&e, &c, now, Uuid::new_v4());
        assert_eq!(record.observed_at, now);
    }

    #[test]
    fn event_timestamp_wins_over_ingestion_time() {
        let mut e = CandidateEvent::new(SourceKind::ConnectionLog, ip("99.182.4.194"));
        e.dst = Some(ip("192.168.86.105"));
        let observed = Utc::now() - chrono::Duration::hours(2);
        e.timestamp = Some(observed);
        let c = classify(&e, None).unwrap();
        let record = normalize(&e, &c, Utc::now(), Uuid::new_v4());
        assert_eq!(record.observed_at, observed);
    }

    #[test]
    fn detail_is_bounded() {
        let mut e = CandidateEvent::new(SourceKind::ProbeLog, ip("45.148.10.72"));
        e.state = Some("x".repeat(500));
        let c = classify(&e, None).unwrap();
        let record = normalize(&e, &c, Utc::now(), Uuid::new_v4());
        assert!(record.details.len() <= MAX_DETAIL_LEN);
    }
}
