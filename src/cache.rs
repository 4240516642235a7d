//! Shared response cache, keyed by call fingerprint.
//!
//! One persisted JSON file per fingerprint under a configured directory,
//! holding the stored response and its creation time, so entries survive
//! restarts. A bounded moka cache sits in front of the files as a
//! read-through layer.
//!
//! The validity window is supplied per *lookup*, not stored on the entry:
//! two callers can treat the same entry as valid for different windows.
//! Because of that, entries are never deleted on expiry — an entry stale
//! for one caller may still be fresh for another requesting a larger
//! window. The moka layer is bounded by entry count only (no TTL) for the
//! same reason.
//!
//! The directory is shared by all broker instances in the process;
//! fingerprints are global, so two instances calling the same upstream
//! with identical arguments share an entry.
//!
//! Failure handling: a write failure is non-fatal (the response is still
//! delivered to the caller); a read or parse failure is treated as a miss.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::telemetry;
use crate::types::CallResult;
use crate::{Result, SluiceError};

/// Configuration for the shared cache store.
///
/// ```rust
/// # use sluice::CacheConfig;
/// let config = CacheConfig::new("/var/lib/sluice/cache").max_memory_entries(5_000);
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding one file per fingerprint.
    pub dir: PathBuf,
    /// Maximum entries in the in-memory read-through layer. Default: 10,000.
    pub max_memory_entries: u64,
}

impl CacheConfig {
    /// Create a config for the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_memory_entries: 10_000,
        }
    }

    /// Set the maximum number of in-memory entries.
    pub fn max_memory_entries(mut self, n: u64) -> Self {
        self.max_memory_entries = n;
        self
    }

    /// Default cache directory: `~/.sluice/cache`, or `./cache` when no
    /// home directory is resolvable.
    pub fn default_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".sluice").join("cache"))
            .unwrap_or_else(|| PathBuf::from("cache"))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(Self::default_dir())
    }
}

/// Persisted cache entry: the response plus its creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    response: CallResult,
    created_at_ms: u64,
}

/// Disk-backed response cache shared by all broker instances.
pub struct CacheStore {
    dir: PathBuf,
    memory: moka::sync::Cache<String, StoredEntry>,
}

impl CacheStore {
    /// Open (creating if needed) the cache directory.
    pub fn open(config: &CacheConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.dir).map_err(|e| {
            SluiceError::Configuration(format!(
                "failed to create cache directory {:?}: {e}",
                config.dir
            ))
        })?;
        Ok(Self {
            dir: config.dir.clone(),
            memory: moka::sync::Cache::new(config.max_memory_entries),
        })
    }

    /// Look up a fingerprint, treating the entry as valid while
    /// `now − created < max_age`. A zero `max_age` always misses.
    pub fn lookup(&self, fingerprint: &str, max_age: Duration) -> Option<CallResult> {
        if max_age.is_zero() {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
            return None;
        }

        let entry = match self.memory.get(fingerprint) {
            Some(entry) => Some(entry),
            None => self.read_disk(fingerprint).inspect(|entry| {
                self.memory.insert(fingerprint.to_string(), entry.clone());
            }),
        };

        match entry {
            Some(entry) if now_ms().saturating_sub(entry.created_at_ms) < ms(max_age) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                debug!(fingerprint = &fingerprint[..8.min(fingerprint.len())], "cache hit");
                Some(entry.response)
            }
            _ => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Store (or overwrite) the entry for a fingerprint.
    ///
    /// A disk write failure is logged and swallowed; the in-memory layer
    /// is still updated so the entry serves until restart.
    pub fn store(&self, fingerprint: &str, response: &CallResult) {
        let entry = StoredEntry {
            response: response.clone(),
            created_at_ms: now_ms(),
        };
        match serde_json::to_vec(&entry) {
            Ok(bytes) => {
                let path = self.path_for(fingerprint);
                if let Err(e) = std::fs::write(&path, bytes) {
                    warn!(?path, error = %e, "cache write failed; response delivered uncached");
                }
            }
            Err(e) => warn!(error = %e, "cache entry serialization failed"),
        }
        self.memory.insert(fingerprint.to_string(), entry);
    }

    fn read_disk(&self, fingerprint: &str) -> Option<StoredEntry> {
        let path = self.path_for(fingerprint);
        let bytes = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(?path, error = %e, "unreadable cache entry treated as miss");
                None
            }
        }
    }

    fn path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{fingerprint}.json"))
    }

    /// The directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn ms(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &Path) -> CacheStore {
        CacheStore::open(&CacheConfig::new(dir)).unwrap()
    }

    fn text(s: &str) -> CallResult {
        CallResult::Text(s.into())
    }

    #[test]
    fn stored_entry_hits_within_window() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = store_in(tmp.path());
        cache.store("fp1", &text("hello"));
        assert_eq!(
            cache.lookup("fp1", Duration::from_secs(60)),
            Some(text("hello"))
        );
    }

    #[test]
    fn zero_max_age_always_misses() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = store_in(tmp.path());
        cache.store("fp1", &text("hello"));
        assert_eq!(cache.lookup("fp1", Duration::ZERO), None);
    }

    #[test]
    fn validity_window_is_per_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = store_in(tmp.path());
        cache.store("fp1", &text("hello"));
        std::thread::sleep(Duration::from_millis(120));

        // Stale for a 50ms window, still fresh for a 60s window.
        assert_eq!(cache.lookup("fp1", Duration::from_millis(50)), None);
        assert_eq!(
            cache.lookup("fp1", Duration::from_secs(60)),
            Some(text("hello"))
        );
    }

    #[test]
    fn entries_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        store_in(tmp.path()).store("fp1", &text("persisted"));

        let reopened = store_in(tmp.path());
        assert_eq!(
            reopened.lookup("fp1", Duration::from_secs(60)),
            Some(text("persisted"))
        );
    }

    #[test]
    fn corrupt_file_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = store_in(tmp.path());
        std::fs::write(tmp.path().join("fp1.json"), b"not json").unwrap();
        assert_eq!(cache.lookup("fp1", Duration::from_secs(60)), None);
    }

    #[test]
    fn unknown_fingerprint_is_a_miss() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = store_in(tmp.path());
        assert_eq!(cache.lookup("missing", Duration::from_secs(60)), None);
    }

    #[test]
    fn store_overwrites_and_refreshes_creation_time() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = store_in(tmp.path());
        cache.store("fp1", &text("old"));
        std::thread::sleep(Duration::from_millis(120));
        cache.store("fp1", &text("new"));

        // The rewrite reset the clock, so a small window still hits.
        assert_eq!(
            cache.lookup("fp1", Duration::from_millis(100)),
            Some(text("new"))
        );
    }
}
