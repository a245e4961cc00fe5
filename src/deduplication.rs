//! Persistent record of alerts that have already been reported.
//!
//! The set maps alert ids to the time they were first observed. Entries stay
//! "seen" until an explicit [`SeenAlertSet::purge_expired`] removes them; a
//! lookup never checks age. Storage problems are logged and never surface to
//! the caller: a missing or corrupt file degrades to an empty set, and a failed
//! write leaves the in-memory state intact.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// Version tag written into the cache file.
const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache file {path} is not valid: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode cache for {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache file {path} has unsupported version {version}")]
    UnsupportedVersion { path: PathBuf, version: u32 },
}

/// On-disk representation of the set.
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: BTreeMap<String, DateTime<Utc>>,
}

/// Read-only snapshot of the cache state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub count: usize,
    pub retention: Duration,
}

/// The set of alert ids already reported, with their first-seen timestamps.
#[derive(Debug)]
pub struct SeenAlertSet {
    path: PathBuf,
    retention: Duration,
    seen: HashMap<String, DateTime<Utc>>,
    dirty: bool,
}

impl SeenAlertSet {
    /// Creates an empty set that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            path: path.into(),
            retention,
            seen: HashMap::new(),
            dirty: false,
        }
    }

    /// Loads the set from `path`, then purges expired entries.
    ///
    /// A missing file yields an empty set. An unreadable or corrupt file is
    /// logged and also yields an empty set, so every alert is treated as new
    /// for this run.
    pub fn load(path: impl Into<PathBuf>, retention: Duration) -> Self {
        let mut set = Self::new(path, retention);
        match read_cache_file(&set.path) {
            Ok(Some(entries)) => {
                info!(count = entries.len(), path = %set.path.display(), "Loaded seen alerts from cache");
                set.seen = entries.into_iter().collect();
                set.purge_expired(retention, Utc::now());
            }
            Ok(None) => {
                info!(path = %set.path.display(), "No existing cache file found, starting fresh");
            }
            Err(e) => {
                error!(error = %e, "Failed to load alert cache, starting with an empty cache");
            }
        }
        set.record_size();
        set
    }

    /// Returns true if `id` has been marked seen and not yet purged.
    pub fn is_seen(&self, id: &str) -> bool {
        self.seen.contains_key(id)
    }

    /// Marks `id` as seen now.
    pub fn mark_seen(&mut self, id: &str) {
        self.mark_seen_at(id, Utc::now());
    }

    /// Marks `id` as seen at `at`. The first recorded time is kept if `id` is
    /// already present, so re-observation does not extend retention.
    pub fn mark_seen_at(&mut self, id: &str, at: DateTime<Utc>) {
        if self.seen.contains_key(id) {
            return;
        }
        self.seen.insert(id.to_string(), at);
        self.dirty = true;
        self.record_size();
    }

    /// The time `id` was first observed, if present.
    pub fn seen_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.seen.get(id).copied()
    }

    /// Removes every entry first seen before `now - retention` and returns
    /// how many were removed.
    pub fn purge_expired(&mut self, retention: Duration, now: DateTime<Utc>) -> usize {
        let retention = ChronoDuration::from_std(retention).unwrap_or(ChronoDuration::MAX);
        let cutoff = now.checked_sub_signed(retention).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let before = self.seen.len();
        self.seen.retain(|_, seen_at| *seen_at >= cutoff);

        let removed = before - self.seen.len();
        if removed > 0 {
            info!(removed, "Cleaned up expired alerts from cache");
            self.dirty = true;
            self.record_size();
        }
        removed
    }

    /// Purges using the configured retention window.
    pub fn purge(&mut self, now: DateTime<Utc>) -> usize {
        self.purge_expired(self.retention, now)
    }

    /// Writes the set to disk, logging instead of failing.
    ///
    /// Returns true if the set is durable after the call.
    pub fn persist(&mut self) -> bool {
        match self.try_persist() {
            Ok(()) => {
                debug!(count = self.seen.len(), path = %self.path.display(), "Saved alert cache");
                self.dirty = false;
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to save alert cache");
                false
            }
        }
    }

    /// Writes the set to a temporary file next to the target path and renames
    /// it into place.
    pub fn try_persist(&self) -> Result<(), CacheError> {
        let file = CacheFile {
            version: CACHE_FORMAT_VERSION,
            entries: self.seen.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|source| CacheError::Encode {
            path: self.path.clone(),
            source,
        })?;

        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp_path = temp_path(&self.path);
        let mut tmp = File::create(&tmp_path).map_err(io_err)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        // The data must be on disk before the rename makes it visible.
        tmp.sync_all().map_err(io_err)?;
        drop(tmp);
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;
        Ok(())
    }

    /// True if the set changed since it was last written.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            count: self.seen.len(),
            retention: self.retention,
        }
    }

    fn record_size(&self) {
        metrics::gauge!("seen_alert_cache_entries").set(self.seen.len() as f64);
    }
}

/// Reads the cache file. `Ok(None)` means the file does not exist.
fn read_cache_file(path: &Path) -> Result<Option<BTreeMap<String, DateTime<Utc>>>, CacheError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let file: CacheFile = serde_json::from_slice(&bytes).map_err(|source| CacheError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    if file.version != CACHE_FORMAT_VERSION {
        return Err(CacheError::UnsupportedVersion {
            path: path.to_path_buf(),
            version: file.version,
        });
    }
    Ok(Some(file.entries))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
