//! URL-keyed article cache with a write-time TTL.
//!
//! Entries live as one JSON file per key (`<sha256(url)>.json`) in a cache directory.
//! Writes go through a temp file plus rename, so every get/set is atomic on its own
//! and concurrent fetch tasks can share one store. Storage faults never surface to
//! callers: reads degrade to a miss, writes to a logged no-op.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::clock::{system_clock, SharedClock};
use crate::ingest::types::NewsItem;

/// Entries older than this (measured from `cached_at`) are ignored.
pub fn default_ttl() -> Duration {
    Duration::hours(2)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub payload: NewsItem,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.cached_at < ttl
    }
}

pub trait CacheStore: Send + Sync {
    /// Hit only for an existing entry younger than the TTL.
    fn get(&self, url: &str) -> Option<NewsItem>;
    /// Upsert keyed by `hash(url)`; resets `cached_at`. Returns `false` on a storage fault.
    fn set(&self, url: &str, item: &NewsItem) -> bool;
}

pub type SharedCache = Arc<dyn CacheStore>;

/// Stable content hash of a URL, hex encoded.
pub fn url_key(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// ------------------------------------------------------------
// File-backed store
// ------------------------------------------------------------

pub struct FileCache {
    dir: PathBuf,
    ttl: Duration,
    clock: SharedClock,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(dir, default_ttl(), system_clock())
    }

    pub fn with_clock(dir: impl Into<PathBuf>, ttl: Duration, clock: SharedClock) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            // Not fatal: every later write will log and no-op.
            warn!(error = ?e, dir = %dir.display(), "cache dir not created");
        }
        Self { dir, ttl, clock }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn read_entry(&self, key: &str) -> io::Result<CacheEntry> {
        let bytes = fs::read(self.entry_path(key))?;
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn write_entry(&self, entry: &CacheEntry) -> io::Result<()> {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let path = self.entry_path(&entry.key);
        // Unique temp name per write so concurrent writers never share a temp file.
        let tmp = self.dir.join(format!(
            "{}.{}.{}.tmp",
            entry.key,
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let json = serde_json::to_vec(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut f = fs::File::create(&tmp)?;
        f.write_all(&json)?;
        f.sync_all()?;
        fs::rename(&tmp, path)
    }
}

impl CacheStore for FileCache {
    fn get(&self, url: &str) -> Option<NewsItem> {
        let key = url_key(url);
        match self.read_entry(&key) {
            Ok(entry) if entry.is_fresh(self.clock.now(), self.ttl) => Some(entry.payload),
            Ok(_) => {
                debug!(url, "cache entry expired");
                None
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(error = ?e, url, "cache get error");
                None
            }
        }
    }

    fn set(&self, url: &str, item: &NewsItem) -> bool {
        let entry = CacheEntry {
            key: url_key(url),
            payload: item.clone(),
            cached_at: self.clock.now(),
        };
        match self.write_entry(&entry) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = ?e, url, "cache set error");
                false
            }
        }
    }
}

// ------------------------------------------------------------
// In-memory store (tests, ephemeral runs)
// ------------------------------------------------------------

pub struct MemoryCache {
    rows: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: SharedClock,
}

impl MemoryCache {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            ttl: default_ttl(),
            clock,
        }
    }

    /// Physical row count, stale rows included.
    pub fn len(&self) -> usize {
        self.rows.lock().map(|g| g.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, url: &str) -> Option<NewsItem> {
        let now = self.clock.now();
        let rows = self.rows.lock().ok()?;
        rows.get(&url_key(url))
            .filter(|e| e.is_fresh(now, self.ttl))
            .map(|e| e.payload.clone())
    }

    fn set(&self, url: &str, item: &NewsItem) -> bool {
        let key = url_key(url);
        let entry = CacheEntry {
            key: key.clone(),
            payload: item.clone(),
            cached_at: self.clock.now(),
        };
        match self.rows.lock() {
            Ok(mut rows) => {
                rows.insert(key, entry);
                true
            }
            Err(_) => {
                warn!(url, "cache set error: poisoned lock");
                false
            }
        }
    }
}
