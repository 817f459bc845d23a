use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error_handling::types::EnrichmentError;

/// On-disk shape of the cache artifact.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    /// Addresses whose geolocation lookup terminally failed.
    failed_geo: Vec<String>,
    /// Reverse-hostname results; None memoizes a failed lookup.
    hostnames: HashMap<String, Option<String>>,
}

/// Process-wide memo of enrichment outcomes, persisted as a JSON artifact.
///
/// Guarantees the pipeline never issues a second external lookup for an
/// address already marked failed within the same process lifetime, and keeps
/// hostname results across restarts. Loaded at startup, flushed periodically
/// and at shutdown.
pub struct EnrichmentCache {
    path: PathBuf,
    failed_geo: HashSet<String>,
    hostnames: HashMap<String, Option<String>>,
    dirty: bool,
}

impl EnrichmentCache {
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<CacheFile>(&raw) {
                Ok(file) => file,
                Err(e) => {
                    warn!("enrichment cache {} unreadable, starting empty: {}", path.display(), e);
                    CacheFile::default()
                }
            },
            Err(_) => {
                debug!("no enrichment cache at {}, starting empty", path.display());
                CacheFile::default()
            }
        };
        Self {
            path,
            failed_geo: file.failed_geo.into_iter().collect(),
            hostnames: file.hostnames,
            dirty: false,
        }
    }

    pub fn flush(&mut self) -> Result<(), EnrichmentError> {
        if !self.dirty {
            return Ok(());
        }
        let file = CacheFile {
            failed_geo: self.failed_geo.iter().cloned().collect(),
            hostnames: self.hostnames.clone(),
        };
        let raw = serde_json::to_string_pretty(&file)
            .map_err(|e| EnrichmentError::BadResponse(e.to_string()))?;
        std::fs::write(&self.path, raw)?;
        self.dirty = false;
        Ok(())
    }

    pub fn geo_failed(&self, address: &str) -> bool {
        self.failed_geo.contains(address)
    }

    pub fn mark_geo_failed(&mut self, address: &str) {
        if self.failed_geo.insert(address.to_string()) {
            self.dirty = true;
        }
    }

    /// Outer None: never looked up. Inner None: lookup failed, memoized.
    pub fn hostname(&self, address: &str) -> Option<Option<String>> {
        self.hostnames.get(address).cloned()
    }

    pub fn set_hostname(&mut self, address: &str, hostname: Option<String>) {
        self.hostnames.insert(address.to_string(), hostname);
        self.dirty = true;
    }
}
