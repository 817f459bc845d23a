use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use uuid::Uuid;

use crate::error_handling::types::StorageError;
use crate::extraction::types::SourceKind;
use crate::storage::types::{
    ConnectionRecord, Direction, EndpointFilter, EndpointSummary, GeolocationRecord, HistoryEntry,
    HistoryFilter, StoreStats,
};

/// Timestamps are stored as fixed-width RFC3339 UTC text so lexicographic
/// comparison in SQL matches chronological order.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| StorageError::ReadFailed)
}

// Internal row mapping for connections to avoid manual try_get
#[derive(Debug, sqlx::FromRow)]
struct ConnectionRow {
    external_addr: String,
    observed_at: String,
    direction: String,
    source_kind: String,
    local_addr: Option<String>,
    local_port: Option<i64>,
    external_port: Option<i64>,
    state: Option<String>,
    orig_packets: i64,
    orig_bytes: i64,
    reply_packets: i64,
    reply_bytes: i64,
    details: String,
    batch_id: String,
}

impl ConnectionRow {
    fn into_record(self) -> Result<ConnectionRecord, StorageError> {
        Ok(ConnectionRecord {
            external_addr: self
                .external_addr
                .parse()
                .map_err(|_| StorageError::ReadFailed)?,
            observed_at: parse_ts(&self.observed_at)?,
            direction: Direction::from_str(&self.direction).unwrap_or(Direction::Unknown),
            source_kind: SourceKind::from_str(&self.source_kind)
                .ok_or(StorageError::ReadFailed)?,
            local_addr: self.local_addr,
            local_port: self.local_port.map(|p| p as u16),
            external_port: self.external_port.map(|p| p as u16),
            state: self.state,
            orig_packets: self.orig_packets as u64,
            orig_bytes: self.orig_bytes as u64,
            reply_packets: self.reply_packets as u64,
            reply_bytes: self.reply_bytes as u64,
            details: self.details,
            batch_id: Uuid::parse_str(&self.batch_id).map_err(|_| StorageError::ReadFailed)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GeolocationRow {
    address: String,
    country: Option<String>,
    country_code: Option<String>,
    region: Option<String>,
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<String>,
    isp: Option<String>,
    org: Option<String>,
    asn: Option<String>,
    hostname: Option<String>,
    last_updated: Option<String>,
}

impl GeolocationRow {
    fn into_record(self) -> Result<GeolocationRecord, StorageError> {
        let last_updated = match self.last_updated {
            Some(raw) => Some(parse_ts(&raw)?),
            None => None,
        };
        Ok(GeolocationRecord {
            address: self.address,
            country: self.country,
            country_code: self.country_code,
            region: self.region,
            city: self.city,
            latitude: self.latitude,
            longitude: self.longitude,
            timezone: self.timezone,
            isp: self.isp,
            org: self.org,
            asn: self.asn,
            hostname: self.hostname,
            last_updated,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EndpointRow {
    external_addr: String,
    connection_count: i64,
    inbound_count: i64,
    outbound_count: i64,
    last_seen: String,
    connection_types: Option<String>,
    directions: Option<String>,
    geo_address: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
    region: Option<String>,
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<String>,
    isp: Option<String>,
    org: Option<String>,
    asn: Option<String>,
    hostname: Option<String>,
}

impl EndpointRow {
    fn into_summary(self) -> Result<EndpointSummary, StorageError> {
        let geolocation = self.geo_address.map(|address| GeolocationRecord {
            address,
            country: self.country,
            country_code: self.country_code,
            region: self.region,
            city: self.city,
            latitude: self.latitude,
            longitude: self.longitude,
            timezone: self.timezone,
            isp: self.isp,
            org: self.org,
            asn: self.asn,
            hostname: self.hostname,
            last_updated: None,
        });
        Ok(EndpointSummary {
            external_addr: self.external_addr,
            connection_count: self.connection_count as u64,
            inbound_count: self.inbound_count as u64,
            outbound_count: self.outbound_count as u64,
            last_seen: parse_ts(&self.last_seen)?,
            connection_types: split_concat(self.connection_types),
            directions: split_concat(self.directions),
            geolocation,
        })
    }
}

fn split_concat(raw: Option<String>) -> Vec<String> {
    raw.map(|s| s.split(',').map(|p| p.trim().to_string()).collect())
        .unwrap_or_default()
}

/// Escape LIKE wildcards in user-supplied search text; the query attaches
/// `ESCAPE '\'` to every LIKE it builds.
fn like_pattern(needle: &str) -> String {
    let escaped = needle.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Durable sqlite store for connection and geolocation records.
///
/// Inserts use insert-if-absent semantics keyed on the record uniqueness
/// tuple; conflicting arrivals are silently ignored. All filters are bound
/// parameters, never concatenated values.
pub struct ConnectionStore {
    pool: Pool<Sqlite>,
}

impl ConnectionStore {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|_| StorageError::WriteFailed)?;
            }
        }
        let opts = SqliteConnectOptions::from_str("sqlite://")
            .map_err(|_| StorageError::ConnectionFailed)?
            .filename(path_ref)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .map_err(|_| StorageError::ConnectionFailed)?;
        let store = Self { pool };
        store.create_schema().await?;
        Ok(store)
    }

    async fn create_schema(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS connections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_addr TEXT NOT NULL,
                observed_at TEXT NOT NULL,
                direction TEXT NOT NULL,
                source_kind TEXT NOT NULL,
                local_addr TEXT,
                local_port INTEGER,
                external_port INTEGER,
                state TEXT,
                orig_packets INTEGER NOT NULL DEFAULT 0,
                orig_bytes INTEGER NOT NULL DEFAULT 0,
                reply_packets INTEGER NOT NULL DEFAULT 0,
                reply_bytes INTEGER NOT NULL DEFAULT 0,
                details TEXT NOT NULL DEFAULT '',
                batch_id TEXT NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        // uniqueness key; COALESCE keeps NULLs from defeating the index
        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_connections_unique
             ON connections(external_addr, observed_at, direction,
                            COALESCE(local_addr, ''), COALESCE(external_port, -1));",
        )
        .execute(&self.pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        for ddl in [
            "CREATE INDEX IF NOT EXISTS idx_connections_addr ON connections(external_addr);",
            "CREATE INDEX IF NOT EXISTS idx_connections_ts ON connections(observed_at);",
            "CREATE INDEX IF NOT EXISTS idx_connections_addr_ts ON connections(external_addr, observed_at);",
            "CREATE INDEX IF NOT EXISTS idx_connections_direction ON connections(direction);",
        ] {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(|_| StorageError::WriteFailed)?;
        }
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS geolocations (
                address TEXT PRIMARY KEY,
                country TEXT,
                country_code TEXT,
                region TEXT,
                city TEXT,
                latitude REAL,
                longitude REAL,
                timezone TEXT,
                isp TEXT,
                org TEXT,
                asn TEXT,
                hostname TEXT,
                last_updated TEXT
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        Ok(())
    }

    /// Insert a batch inside one transaction; duplicate keys are no-ops.
    /// Returns the number of rows actually inserted.
    pub async fn insert_batch(&self, records: &[ConnectionRecord]) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await.map_err(|_| StorageError::WriteFailed)?;
        let mut inserted = 0u64;
        for record in records {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO connections
                 (external_addr, observed_at, direction, source_kind, local_addr,
                  local_port, external_port, state, orig_packets, orig_bytes,
                  reply_packets, reply_bytes, details, batch_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            )
            .bind(record.external_addr.to_string())
            .bind(fmt_ts(record.observed_at))
            .bind(record.direction.as_str())
            .bind(record.source_kind.as_str())
            .bind(record.local_addr.clone())
            .bind(record.local_port.map(|p| p as i64))
            .bind(record.external_port.map(|p| p as i64))
            .bind(record.state.clone())
            .bind(record.orig_packets as i64)
            .bind(record.orig_bytes as i64)
            .bind(record.reply_packets as i64)
            .bind(record.reply_bytes as i64)
            .bind(&record.details)
            .bind(record.batch_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|_| StorageError::WriteFailed)?;
            inserted += result.rows_affected();
        }
        tx.commit().await.map_err(|_| StorageError::WriteFailed)?;
        Ok(inserted)
    }

    pub async fn upsert_geolocation(&self, geo: &GeolocationRecord) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO geolocations
             (address, country, country_code, region, city, latitude, longitude,
              timezone, isp, org, asn, hostname, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(address) DO UPDATE SET
               country=excluded.country,
               country_code=excluded.country_code,
               region=excluded.region,
               city=excluded.city,
               latitude=excluded.latitude,
               longitude=excluded.longitude,
               timezone=excluded.timezone,
               isp=excluded.isp,
               org=excluded.org,
               asn=excluded.asn,
               hostname=COALESCE(excluded.hostname, geolocations.hostname),
               last_updated=excluded.last_updated",
        )
        .bind(&geo.address)
        .bind(&geo.country)
        .bind(&geo.country_code)
        .bind(&geo.region)
        .bind(&geo.city)
        .bind(geo.latitude)
        .bind(geo.longitude)
        .bind(&geo.timezone)
        .bind(&geo.isp)
        .bind(&geo.org)
        .bind(&geo.asn)
        .bind(&geo.hostname)
        .bind(fmt_ts(geo.last_updated.unwrap_or_else(Utc::now)))
        .execute(&self.pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        Ok(())
    }

    pub async fn get_geolocation(
        &self,
        address: &str,
    ) -> Result<Option<GeolocationRecord>, StorageError> {
        let row: Option<GeolocationRow> =
            sqlx::query_as("SELECT * FROM geolocations WHERE address = ?1")
                .bind(address)
                .fetch_optional(&self.pool)
                .await
                .map_err(|_| StorageError::ReadFailed)?;
        row.map(|r| r.into_record()).transpose()
    }

    /// Distinct external addresses with no geolocation row yet, most recent
    /// first so fresh endpoints are enriched before stale ones.
    pub async fn addresses_missing_geolocation(
        &self,
        limit: u32,
    ) -> Result<Vec<String>, StorageError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT c.external_addr FROM connections c
             LEFT JOIN geolocations g ON g.address = c.external_addr
             WHERE g.address IS NULL
             GROUP BY c.external_addr
             ORDER BY MAX(c.observed_at) DESC
             LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|_| StorageError::ReadFailed)?;
        Ok(rows.into_iter().map(|(addr,)| addr).collect())
    }

    pub async fn aggregated_endpoints(
        &self,
        filter: &EndpointFilter,
    ) -> Result<Vec<EndpointSummary>, StorageError> {
        let mut sql = String::from(
            "SELECT c.external_addr AS external_addr,
                    COUNT(*) AS connection_count,
                    SUM(CASE WHEN c.direction = 'inbound' THEN 1 ELSE 0 END) AS inbound_count,
                    SUM(CASE WHEN c.direction = 'outbound' THEN 1 ELSE 0 END) AS outbound_count,
                    MAX(c.observed_at) AS last_seen,
                    GROUP_CONCAT(DISTINCT c.source_kind) AS connection_types,
                    GROUP_CONCAT(DISTINCT c.direction) AS directions,
                    g.address AS geo_address,
                    g.country AS country,
                    g.country_code AS country_code,
                    g.region AS region,
                    g.city AS city,
                    g.latitude AS latitude,
                    g.longitude AS longitude,
                    g.timezone AS timezone,
                    g.isp AS isp,
                    g.org AS org,
                    g.asn AS asn,
                    g.hostname AS hostname
             FROM connections c
             LEFT JOIN geolocations g ON g.address = c.external_addr",
        );
        let mut clauses: Vec<String> = Vec::new();
        let mut binds: Vec<String> = Vec::new();
        if let Some(since) = filter.since {
            clauses.push("c.observed_at >= ?".into());
            binds.push(fmt_ts(since));
        }
        if let Some(until) = filter.until {
            clauses.push("c.observed_at <= ?".into());
            binds.push(fmt_ts(until));
        }
        if let Some(direction) = filter.direction {
            clauses.push("c.direction = ?".into());
            binds.push(direction.as_str().into());
        }
        if let Some(search) = &filter.search {
            let pattern = like_pattern(search);
            let mut fields = Vec::new();
            for field in [
                "c.external_addr",
                "g.hostname",
                "g.city",
                "g.country",
                "g.region",
                "g.isp",
                "g.org",
            ] {
                fields.push(format!("{} LIKE ? ESCAPE '\\'", field));
                binds.push(pattern.clone());
            }
            clauses.push(format!("({})", fields.join(" OR ")));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" GROUP BY c.external_addr ORDER BY last_seen DESC LIMIT ?");

        let mut q = sqlx::query_as::<_, EndpointRow>(&sql);
        for bind in &binds {
            q = q.bind(bind);
        }
        q = q.bind(filter.limit as i64);
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|_| StorageError::ReadFailed)?;
        rows.into_iter().map(|r| r.into_summary()).collect()
    }

    pub async fn raw_history(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<HistoryEntry>, StorageError> {
        let mut sql = String::from(
            "SELECT external_addr, observed_at, direction, source_kind, local_addr,
                    local_port, external_port, state, orig_packets, orig_bytes,
                    reply_packets, reply_bytes, details, batch_id
             FROM connections",
        );
        let mut clauses: Vec<String> = Vec::new();
        let mut binds: Vec<String> = Vec::new();
        if let Some(since) = filter.since {
            clauses.push("observed_at >= ?".into());
            binds.push(fmt_ts(since));
        }
        if let Some(until) = filter.until {
            clauses.push("observed_at <= ?".into());
            binds.push(fmt_ts(until));
        }
        if let Some(direction) = filter.direction {
            clauses.push("direction = ?".into());
            binds.push(direction.as_str().into());
        }
        if let Some(address) = filter.address {
            clauses.push("external_addr = ?".into());
            binds.push(address.to_string());
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY observed_at DESC LIMIT ?");

        let mut q = sqlx::query_as::<_, ConnectionRow>(&sql);
        for bind in &binds {
            q = q.bind(bind);
        }
        q = q.bind(filter.limit as i64);
        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|_| StorageError::ReadFailed)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let record = row.into_record()?;
            let geolocation = self.get_geolocation(&record.external_addr.to_string()).await?;
            entries.push(HistoryEntry { record, geolocation });
        }
        Ok(entries)
    }

    /// Delete up to `batch` rows older than `cutoff`, oldest first.
    pub async fn delete_older_than(
        &self,
        cutoff: DateTime<Utc>,
        batch: u32,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "DELETE FROM connections WHERE id IN (
                SELECT id FROM connections WHERE observed_at < ?1
                ORDER BY observed_at ASC LIMIT ?2
            )",
        )
        .bind(fmt_ts(cutoff))
        .bind(batch as i64)
        .execute(&self.pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        Ok(result.rows_affected())
    }

    /// Delete the `batch` oldest rows unconditionally (size pressure).
    pub async fn delete_oldest(&self, batch: u32) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "DELETE FROM connections WHERE id IN (
                SELECT id FROM connections ORDER BY observed_at ASC LIMIT ?1
            )",
        )
        .bind(batch as i64)
        .execute(&self.pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        Ok(result.rows_affected())
    }

    /// Drop geolocation rows whose address no longer appears in connections.
    pub async fn delete_orphan_geolocations(&self) -> Result<u64, StorageError> {
        let result = sqlx::query(
            "DELETE FROM geolocations WHERE address NOT IN (
                SELECT DISTINCT external_addr FROM connections
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|_| StorageError::WriteFailed)?;
        Ok(result.rows_affected())
    }

    pub async fn vacuum(&self) -> Result<(), StorageError> {
        debug!("running VACUUM");
        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(|_| StorageError::WriteFailed)?;
        Ok(())
    }

    /// Allocated database size in megabytes (page_count x page_size).
    pub async fn db_size_mb(&self) -> Result<f64, StorageError> {
        let (pages,): (i64,) = sqlx::query_as("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(|_| StorageError::ReadFailed)?;
        let (page_size,): (i64,) = sqlx::query_as("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(|_| StorageError::ReadFailed)?;
        Ok((pages * page_size) as f64 / (1024.0 * 1024.0))
    }

    pub async fn count_connections(&self) -> Result<u64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM connections")
            .fetch_one(&self.pool)
            .await
            .map_err(|_| StorageError::ReadFailed)?;
        Ok(count as u64)
    }

    pub async fn stats(&self) -> Result<StoreStats, StorageError> {
        let (connection_rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM connections")
            .fetch_one(&self.pool)
            .await
            .map_err(|_| StorageError::ReadFailed)?;
        let (geolocation_rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM geolocations")
            .fetch_one(&self.pool)
            .await
            .map_err(|_| StorageError::ReadFailed)?;
        let (unique_addresses,): (i64,) =
            sqlx::query_as("SELECT COUNT(DISTINCT external_addr) FROM connections")
                .fetch_one(&self.pool)
                .await
                .map_err(|_| StorageError::ReadFailed)?;
        let (oldest, newest): (Option<String>, Option<String>) =
            sqlx::query_as("SELECT MIN(observed_at), MAX(observed_at) FROM connections")
                .fetch_one(&self.pool)
                .await
                .map_err(|_| StorageError::ReadFailed)?;
        Ok(StoreStats {
            connection_rows: connection_rows as u64,
            geolocation_rows: geolocation_rows as u64,
            unique_addresses: unique_addresses as u64,
            db_size_mb: self.db_size_mb().await?,
            oldest: oldest.as_deref().map(parse_ts).transpose()?,
            newest: newest.as_deref().map(parse_ts).transpose()?,
        })
    }

    /// Oldest surviving record timestamp, if any rows remain.
    pub async fn oldest_timestamp(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let (oldest,): (Option<String>,) =
            sqlx::query_as("SELECT MIN(observed_at) FROM connections")
                .fetch_one(&self.pool)
                .await
                .map_err(|_| StorageError::ReadFailed)?;
        oldest.as_deref().map(parse_ts).transpose()
    }
}
