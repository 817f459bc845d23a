use chrono::{Duration, Utc};
use log::{info, warn};

use crate::configuration::types::RetentionConfig;
use crate::error_handling::types::StorageError;
use crate::storage::connection_store::ConnectionStore;
use crate::storage::types::RetentionReport;

/// Hard cap on deletion-loop iterations so a run terminates even under
/// pathological size/age settings.
const MAX_SWEEP_ITERATIONS: u32 = 1000;

/// Rows deleted in a run before compaction is considered worthwhile.
const VACUUM_THRESHOLD: u64 = 500;

/// Applies age and size limits to the connection store.
///
/// Runs are idempotent and safe to interleave with ingestion: deletion is
/// keyed on stored row ids selected oldest-first, never on assumptions about
/// what ingestion is writing concurrently. A failing batch ends the run with
/// partial results; the next scheduled run retries.
pub struct RetentionEngine {
    config: RetentionConfig,
}

impl RetentionEngine {
    pub fn new(config: RetentionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RetentionConfig) {
        self.config = config;
    }

    pub async fn run(&self, store: &ConnectionStore) -> Result<RetentionReport, StorageError> {
        let mut report = RetentionReport {
            size_before_mb: store.db_size_mb().await?,
            ..Default::default()
        };

        if self.config.enable_time_limit {
            report.aged_deleted = self.sweep_aged(store).await;
        }
        if self.config.enable_size_limit {
            report.sized_deleted = self.sweep_sized(store).await;
        }
        report.orphans_deleted = match store.delete_orphan_geolocations().await {
            Ok(n) => n,
            Err(e) => {
                warn!("orphan geolocation cleanup failed: {}", e);
                0
            }
        };

        let deleted = report.aged_deleted + report.sized_deleted + report.orphans_deleted;
        if deleted > VACUUM_THRESHOLD {
            if let Err(e) = store.vacuum().await {
                warn!("compaction after retention failed: {}", e);
            }
        }

        report.size_after_mb = store.db_size_mb().await?;
        info!(
            "retention run: aged={} sized={} orphans={} size {:.2}MB -> {:.2}MB",
            report.aged_deleted,
            report.sized_deleted,
            report.orphans_deleted,
            report.size_before_mb,
            report.size_after_mb
        );
        Ok(report)
    }

    async fn sweep_aged(&self, store: &ConnectionStore) -> u64 {
        let cutoff = Utc::now() - Duration::days(self.config.max_age_days);
        let mut deleted = 0u64;
        for _ in 0..MAX_SWEEP_ITERATIONS {
            match store
                .delete_older_than(cutoff, self.config.cleanup_batch_size)
                .await
            {
                Ok(0) => break,
                Ok(n) => deleted += n,
                Err(e) => {
                    warn!("age-based cleanup batch failed: {}", e);
                    break;
                }
            }
        }
        deleted
    }

    async fn sweep_sized(&self, store: &ConnectionStore) -> u64 {
        let mut deleted = 0u64;
        for _ in 0..MAX_SWEEP_ITERATIONS {
            match store.db_size_mb().await {
                Ok(size) if size <= self.config.max_size_mb => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("size check failed during retention: {}", e);
                    break;
                }
            }
            match store.delete_oldest(self.config.cleanup_batch_size).await {
                // a short batch means the table is exhausted
                Ok(n) => {
                    deleted += n;
                    if n < self.config.cleanup_batch_size as u64 {
                        break;
                    }
                }
                Err(e) => {
                    warn!("size-based cleanup batch failed: {}", e);
                    break;
                }
            }
        }
        deleted
    }
}
