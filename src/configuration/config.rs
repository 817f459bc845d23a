use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::configuration::types::{
    AcquisitionConfig, EnrichmentConfig, ReductionConfig, RetentionConfig, ScheduleConfig,
};
use crate::error_handling::types::ConfigError;

/// Complete runtime configuration, loaded from a TOML file.
///
/// # Fields Overview
///
/// - `database_path`: location of the sqlite store
/// - `egress_hostname`: hostname whose resolution yields the gateway's own
///   externally-visible address (excluded from results as self-traffic)
/// - `acquisition`: one raw-text command per telemetry source
/// - `schedule`: ingestion and retention intervals
/// - `retention`: size/age limits applied by the retention scheduler
/// - `reduction`: noise-suppression policy knobs
/// - `enrichment`: external-lookup budget and cache artifact location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub database_path: PathBuf,
    pub egress_hostname: String,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub reduction: ReductionConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.egress_hostname.trim().is_empty() {
            return Err(ConfigError::BadHostname(
                "egress_hostname must not be empty".into(),
            ));
        }
        if self.acquisition.configured_sources() == 0 {
            return Err(ConfigError::NoSourcesConfigured(
                "at least one acquisition command is required".into(),
            ));
        }
        if self.retention.max_age_days <= 0 {
            return Err(ConfigError::NotInRange(
                "retention.max_age_days must be positive".into(),
            ));
        }
        if self.retention.max_size_mb <= 0.0 {
            return Err(ConfigError::NotInRange(
                "retention.max_size_mb must be positive".into(),
            ));
        }
        if self.retention.cleanup_batch_size == 0 {
            return Err(ConfigError::NotInRange(
                "retention.cleanup_batch_size must be positive".into(),
            ));
        }
        if self.reduction.bucket_secs <= 0 || self.reduction.listen_dedup_window_secs <= 0 {
            return Err(ConfigError::NotInRange(
                "reduction windows must be positive".into(),
            ));
        }
        if self.enrichment.per_cycle_cap == 0 {
            return Err(ConfigError::NotInRange(
                "enrichment.per_cycle_cap must be positive".into(),
            ));
        }
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                return Err(ConfigError::DirectoryDoesNotExist(format!(
                    "{} does not exist",
                    parent.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_toml() -> String {
        r#"
database_path = "gatewatch.sqlite3"
egress_hostname = "gw.example.net"

[acquisition]
socket_table = "ssh admin@gw netstat -tun"
conntrack = "ssh admin@gw cat /proc/net/nf_conntrack"

[retention]
max_size_mb = 128.0
max_age_days = 30
cleanup_batch_size = 500
enable_size_limit = true
enable_time_limit = true

[enrichment]
per_cycle_cap = 25
request_delay_ms = 1000
cache_file = "cache.json"
geo_endpoint = "http://ip-api.com/json/"
"#
        .to_string()
    }

    #[test]
    fn parses_sample_config() {
        let config: Config = toml::from_str(&sample_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.retention.max_age_days, 30);
        assert_eq!(config.enrichment.per_cycle_cap, 25);
        assert_eq!(config.acquisition.configured_sources(), 2);
        // omitted sections fall back to defaults
        assert_eq!(config.schedule.ingest_interval_secs, 300);
        assert_eq!(config.reduction.bucket_secs, 300);
    }

    #[test]
    fn rejects_empty_hostname() {
        let mut config: Config = toml::from_str(&sample_toml()).unwrap();
        config.egress_hostname = " ".into();
        assert!(matches!(config.validate(), Err(ConfigError::BadHostname(_))));
    }

    #[test]
    fn rejects_no_sources() {
        let mut config: Config = toml::from_str(&sample_toml()).unwrap();
        config.acquisition = AcquisitionConfig::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoSourcesConfigured(_))
        ));
    }

    #[test]
    fn rejects_zero_batch_size() {
        let mut config: Config = toml::from_str(&sample_toml()).unwrap();
        config.retention.cleanup_batch_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NotInRange(_))));
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/gatewatch.toml"));
        assert!(matches!(err, Err(ConfigError::IoError(_))));
    }
}
