use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error_handling::types::QueryError;
use crate::storage::connection_store::ConnectionStore;
use crate::storage::types::{
    Direction, EndpointFilter, EndpointSummary, HistoryEntry, HistoryFilter, StoreStats,
};

pub const DEFAULT_ROW_LIMIT: u32 = 100;
pub const MAX_ROW_LIMIT: u32 = 1000;

/// Caller-facing parameters for the aggregation query, before validation.
#[derive(Debug, Clone, Default)]
pub struct EndpointQueryParams {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub direction: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryQueryParams {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub direction: Option<String>,
    pub address: Option<String>,
    pub limit: Option<u32>,
}

/// Read-side facade over the store.
///
/// Validates caller input into typed filters; bad parameters surface as
/// [`QueryError`] rejected-request outcomes while internal pipeline failures
/// never reach consumers through this interface.
pub struct QueryService {
    store: Arc<ConnectionStore>,
}

impl QueryService {
    pub fn new(store: Arc<ConnectionStore>) -> Self {
        Self { store }
    }

    pub async fn aggregated_endpoints(
        &self,
        params: EndpointQueryParams,
    ) -> Result<Vec<EndpointSummary>, QueryError> {
        let filter = EndpointFilter {
            since: params.since,
            until: params.until,
            direction: parse_direction(params.direction.as_deref())?,
            search: normalize_search(params.search),
            limit: validate_limit(params.limit)?,
        };
        validate_range(filter.since, filter.until)?;
        Ok(self.store.aggregated_endpoints(&filter).await?)
    }

    pub async fn raw_history(
        &self,
        params: HistoryQueryParams,
    ) -> Result<Vec<HistoryEntry>, QueryError> {
        let address = match params.address.as_deref() {
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| QueryError::BadAddress(raw.to_string()))?,
            ),
            None => None,
        };
        let filter = HistoryFilter {
            since: params.since,
            until: params.until,
            direction: parse_direction(params.direction.as_deref())?,
            address,
            limit: validate_limit(params.limit)?,
        };
        validate_range(filter.since, filter.until)?;
        Ok(self.store.raw_history(&filter).await?)
    }

    /// Aggregate statistics for the administrative interface.
    pub async fn stats(&self) -> Result<StoreStats, QueryError> {
        Ok(self.store.stats().await?)
    }
}

fn validate_limit(limit: Option<u32>) -> Result<u32, QueryError> {
    match limit {
        None => Ok(DEFAULT_ROW_LIMIT),
        Some(0) => Err(QueryError::BadLimit("limit must be positive".into())),
        Some(n) if n > MAX_ROW_LIMIT => Err(QueryError::BadLimit(format!(
            "limit {} exceeds maximum {}",
            n, MAX_ROW_LIMIT
        ))),
        Some(n) => Ok(n),
    }
}

fn parse_direction(raw: Option<&str>) -> Result<Option<Direction>, QueryError> {
    match raw {
        None => Ok(None),
        Some(s) => Direction::from_str(s.trim())
            .map(Some)
            .ok_or_else(|| QueryError::BadDirection(format!("unknown direction '{}'", s))),
    }
}

fn normalize_search(search: Option<String>) -> Option<String> {
    search
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn validate_range(
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> Result<(), QueryError> {
    if let (Some(since), Some(until)) = (since, until) {
        if since > until {
            return Err(QueryError::BadTimeRange(format!(
                "{} is after {}",
                since, until
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::types::SourceKind;
    use crate::storage::types::ConnectionRecord;
    use chrono::Duration;
    use tempfile::TempDir;
    use uuid::Uuid;

    async fn seeded_service() -> QueryService {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("query.sqlite3");
        Box::leak(Box::new(dir));
        let store = ConnectionStore::open(path).await.unwrap();
        let mut batch = Vec::new();
        for i in 0..5 {
            batch.push(record(&format!("20.0.0.{}", i), Direction::Inbound, i));
            batch.push(record(&format!("30.0.0.{}", i), Direction::Outbound, i));
        }
        store.insert_batch(&batch).await.unwrap();
        QueryService::new(Arc::new(store))
    }

    fn record(addr: &str, direction: Direction, minutes_ago: i64) -> ConnectionRecord {
        ConnectionRecord {
            external_addr: addr.parse().unwrap(),
            observed_at: Utc::now() - Duration::minutes(minutes_ago),
            direction,
            source_kind: SourceKind::SocketTable,
            local_addr: Some("192.168.1.5".into()),
            local_port: None,
            external_port: Some(443),
            state: None,
            orig_packets: 0,
            orig_bytes: 0,
            reply_packets: 0,
            reply_bytes: 0,
            details: String::new(),
            batch_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn direction_filter_returns_only_matching_endpoints() {
        let svc = seeded_service().await;
        let results = svc
            .aggregated_endpoints(EndpointQueryParams {
                direction: Some("inbound".into()),
                limit: Some(10),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|s| s.outbound_count == 0));
    }

    #[tokio::test]
    async fn results_are_ordered_by_recency() {
        let svc = seeded_service().await;
        let results = svc
            .aggregated_endpoints(EndpointQueryParams::default())
            .await
            .unwrap();
        for pair in results.windows(2) {
            assert!(pair[0].last_seen >= pair[1].last_seen);
        }
    }

    #[tokio::test]
    async fn history_filters_by_address() {
        let svc = seeded_service().await;
        let results = svc
            .raw_history(HistoryQueryParams {
                address: Some("20.0.0.1".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].record.external_addr.to_string(), "20.0.0.1");
    }

    #[tokio::test]
    async fn bad_address_is_rejected() {
        let svc = seeded_service().await;
        let err = svc
            .raw_history(HistoryQueryParams {
                address: Some("not-an-ip".into()),
                ..Default::default()
            })
            .await;
        assert!(matches!(err, Err(QueryError::BadAddress(_))));
    }

    #[tokio::test]
    async fn zero_and_oversized_limits_are_rejected() {
        let svc = seeded_service().await;
        assert!(matches!(
            svc.aggregated_endpoints(EndpointQueryParams {
                limit: Some(0),
                ..Default::default()
            })
            .await,
            Err(QueryError::BadLimit(_))
        ));
        assert!(matches!(
            svc.aggregated_endpoints(EndpointQueryParams {
                limit: Some(MAX_ROW_LIMIT + 1),
                ..Default::default()
            })
            .await,
            Err(QueryError::BadLimit(_))
        ));
    }

    #[tokio::test]
    async fn inverted_time_range_is_rejected() {
        let svc = seeded_service().await;
        let err = svc
            .aggregated_endpoints(EndpointQueryParams {
                since: Some(Utc::now()),
                until: Some(Utc::now() - Duration::hours(1)),
                ..Default::default()
            })
            .await;
        assert!(matches!(err, Err(QueryError::BadTimeRange(_))));
    }

    #[tokio::test]
    async fn stats_reflect_seeded_rows() {
        let svc = seeded_service().await;
        let stats = svc.stats().await.unwrap();
        assert_eq!(stats.connection_rows, 10);
        assert_eq!(stats.unique_addresses, 10);
        assert!(stats.oldest.is_some());
        assert!(stats.newest.is_some());
    }
}
