use chrono::{DateTime, Duration, TimeZone, Utc};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use crate::configuration::types::ReductionConfig;
use crate::storage::types::{ConnectionRecord, Direction};

/// Noise-suppression stage between normalization and persistence.
///
/// Applies, in order: the transient-state filter, the listening-port dedup
/// window, and high-volume time-bucket aggregation. Purely a volume-control
/// measure: the first observation of a previously-unseen external address is
/// always persisted, whatever the policies would otherwise do with it.
///
/// Holds process-wide mutable state (the dedup window and the seen-address
/// set); only one ingestion job runs at a time, and the collector owns this
/// engine mutably, so no locking is needed.
pub struct ReductionEngine {
    config: ReductionConfig,
    recently_listening: HashMap<String, DateTime<Utc>>,
    window_cleared_at: DateTime<Utc>,
    seen_addrs: HashSet<Ipv4Addr>,
}

impl ReductionEngine {
    pub fn new(config: ReductionConfig) -> Self {
        Self {
            config,
            recently_listening: HashMap::new(),
            window_cleared_at: Utc::now(),
            seen_addrs: HashSet::new(),
        }
    }

    /// Run all policies over one normalized batch.
    pub fn reduce(&mut self, batch: Vec<ConnectionRecord>) -> Vec<ConnectionRecord> {
        let before = batch.len();
        self.roll_window();

        let mut kept: Vec<ConnectionRecord> = Vec::with_capacity(batch.len());
        let mut buckets: HashMap<(Ipv4Addr, i64), usize> = HashMap::new();

        for record in batch {
            let first_sighting = self.seen_addrs.insert(record.external_addr);
            if !first_sighting {
                if self.is_transient(&record) {
                    continue;
                }
                if self.is_duplicate_listener(&record) {
                    continue;
                }
            } else {
                // First observation still seeds the dedup window.
                self.note_listener(&record);
            }

            if self.config.high_volume_addrs.contains(&record.external_addr)
                && record.direction == Direction::Outbound
            {
                let bucket = bucket_start(record.observed_at, self.config.bucket_secs);
                match buckets.get(&(record.external_addr, bucket)) {
                    Some(&idx) => {
                        merge_into(&mut kept[idx], &record);
                        continue;
                    }
                    None => {
                        let mut record = record;
                        record.observed_at = Utc
                            .timestamp_opt(bucket, 0)
                            .single()
                            .unwrap_or(record.observed_at);
                        buckets.insert((record.external_addr, bucket), kept.len());
                        kept.push(record);
                        continue;
                    }
                }
            }

            kept.push(record);
        }

        if kept.len() < before {
            debug!("reduction: {} -> {} records", before, kept.len());
        }
        kept
    }

    fn is_transient(&self, record: &ConnectionRecord) -> bool {
        match &record.state {
            Some(state) => self
                .config
                .transient_states
                .iter()
                .any(|t| t.eq_ignore_ascii_case(state)),
            None => false,
        }
    }

    fn is_duplicate_listener(&mut self, record: &ConnectionRecord) -> bool {
        if !listener_key_applies(record) {
            return false;
        }
        let key = listener_key(record);
        let now = Utc::now();
        match self.recently_listening.get(&key) {
            Some(&seen) if now - seen < Duration::seconds(self.config.listen_dedup_window_secs) => {
                true
            }
            _ => {
                self.recently_listening.insert(key, now);
                false
            }
        }
    }

    fn note_listener(&mut self, record: &ConnectionRecord) {
        if listener_key_applies(record) {
            self.recently_listening.insert(listener_key(record), Utc::now());
        }
    }

    /// The dedup map is bounded by clearing it wholesale once per window.
    fn roll_window(&mut self) {
        let now = Utc::now();
        if now - self.window_cleared_at >= Duration::seconds(self.config.listen_dedup_window_secs) {
            self.recently_listening.clear();
            self.window_cleared_at = now;
        }
    }
}

fn listener_key_applies(record: &ConnectionRecord) -> bool {
    record.direction == Direction::Inbound
        && record
            .state
            .as_deref()
            .map(|s| s.to_ascii_uppercase().contains("LISTEN"))
            .unwrap_or(false)
}

fn listener_key(record: &ConnectionRecord) -> String {
    format!(
        "{}:{}",
        record.local_addr.as_deref().unwrap_or("-"),
        record.local_port.map(|p| p.to_string()).unwrap_or_default()
    )
}

fn bucket_start(ts: DateTime<Utc>, bucket_secs: i64) -> i64 {
    let secs = ts.timestamp();
    secs - secs.rem_euclid(bucket_secs)
}

fn merge_into(target: &mut ConnectionRecord, other: &ConnectionRecord) {
    target.orig_packets += other.orig_packets;
    target.orig_bytes += other.orig_bytes;
    target.reply_packets += other.reply_packets;
    target.reply_bytes += other.reply_bytes;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::types::SourceKind;
    use uuid::Uuid;

    fn config() -> ReductionConfig {
        ReductionConfig {
            transient_states: vec!["TIME_WAIT".into(), "CLOSE".into(), "FIN_WAIT2".into()],
            listen_dedup_window_secs: 3600,
            high_volume_addrs: vec!["17.253.14.125".parse().unwrap()],
            bucket_secs: 300,
        }
    }

    fn record(addr: &str, direction: Direction) -> ConnectionRecord {
        ConnectionRecord {
            external_addr: addr.parse().unwrap(),
            observed_at: Utc::now(),
            direction,
            source_kind: SourceKind::SocketTable,
            local_addr: Some("192.168.1.5".into()),
            local_port: Some(443),
            external_port: Some(51000),
            state: Some("ESTABLISHED".into()),
            orig_packets: 1,
            orig_bytes: 100,
            reply_packets: 1,
            reply_bytes: 200,
            details: String::new(),
            batch_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn transient_states_are_dropped_after_first_sighting() {
        let mut engine = ReductionEngine::new(config());
        let mut first = record("8.8.8.8", Direction::Outbound);
        first.state = Some("TIME_WAIT".into());
        // first observation of the endpoint survives even in a transient state
        assert_eq!(engine.reduce(vec![first.clone()]).len(), 1);
        // repeats do not
        assert!(engine.reduce(vec![first]).is_empty());
    }

    #[test]
    fn listening_repeats_within_window_are_suppressed() {
        let mut engine = ReductionEngine::new(config());
        let mut listener = record("45.148.10.72", Direction::Inbound);
        listener.state = Some("LISTEN".into());
        assert_eq!(engine.reduce(vec![listener.clone()]).len(), 1);
        assert!(engine.reduce(vec![listener.clone()]).is_empty());
        // a different port is a different key
        let mut other_port = listener.clone();
        other_port.local_port = Some(8443);
        assert_eq!(engine.reduce(vec![other_port]).len(), 1);
    }

    #[test]
    fn high_volume_bucket_merges_and_sums() {
        let mut engine = ReductionEngine::new(config());
        let ts = Utc.timestamp_opt(1_700_000_100, 0).single().unwrap();
        let mut a = record("17.253.14.125", Direction::Outbound);
        a.observed_at = ts;
        let mut b = a.clone();
        b.observed_at = ts + Duration::seconds(30);
        let reduced = engine.reduce(vec![a, b]);
        assert_eq!(reduced.len(), 1);
        assert_eq!(reduced[0].orig_bytes, 200);
        assert_eq!(reduced[0].reply_bytes, 400);
        assert_eq!(reduced[0].orig_packets, 2);
        // timestamp is snapped to the bucket start
        assert_eq!(reduced[0].observed_at.timestamp() % 300, 0);
    }

    #[test]
    fn different_buckets_stay_separate() {
        let mut engine = ReductionEngine::new(config());
        let ts = Utc.timestamp_opt(1_700_000_100, 0).single().unwrap();
        let mut a = record("17.253.14.125", Direction::Outbound);
        a.observed_at = ts;
        let mut b = a.clone();
        b.observed_at = ts + Duration::seconds(600);
        assert_eq!(engine.reduce(vec![a, b]).len(), 2);
    }

    #[test]
    fn inbound_records_are_not_bucketed() {
        let mut engine = ReductionEngine::new(config());
        let a = record("17.253.14.125", Direction::Inbound);
        let b = a.clone();
        assert_eq!(engine.reduce(vec![a, b]).len(), 2);
    }

    #[test]
    fn unlisted_addresses_are_not_bucketed() {
        let mut engine = ReductionEngine::new(config());
        let a = record("8.8.8.8", Direction::Outbound);
        let b = a.clone();
        assert_eq!(engine.reduce(vec![a, b]).len(), 2);
    }
}
