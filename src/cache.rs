//! Freshness cache: item id → (classification, written-at).
//!
//! Entries expire lazily: `get` treats anything older than the TTL, or
//! stamped in the future, as absent, and nothing is ever purged. Storage sits behind `EntryStore`:
//! - `FileStore`: one JSON document per item, written via temp file + rename,
//!   survives restarts.
//! - `MemoryStore`: process-local map, for tests and ephemeral runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::model::Classification;

pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Persisted shape: `{ id, data, timestamp }`, timestamp in epoch millis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: String,
    pub data: Classification,
    pub timestamp: i64,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache entry encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Option<CacheEntry>, CacheError>;
    async fn store(&self, entry: &CacheEntry) -> Result<(), CacheError>;
    fn name(&self) -> &'static str;
}

/* ----------------------------
File-backed store
---------------------------- */

pub struct FileStore {
    dir: PathBuf,
}

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        // best-effort; `store` retries and reports
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!(target: "cache", dir = %dir.display(), error = %e, "cache dir not ready");
        }
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key_digest(id)))
    }
}

/// File names are hex SHA-256 of the id, so arbitrary ids are path-safe.
fn key_digest(id: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(id.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[async_trait]
impl EntryStore for FileStore {
    async fn load(&self, id: &str) -> Result<Option<CacheEntry>, CacheError> {
        let bytes = match tokio::fs::read(self.entry_path(id)).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: CacheEntry = serde_json::from_slice(&bytes)?;
        if entry.id != id {
            return Ok(None);
        }
        Ok(Some(entry))
    }

    async fn store(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::Unavailable(format!("{}: {e}", self.dir.display())))?;

        let path = self.entry_path(&entry.id);
        // Unique temp name per writer: same-key races end in one whole file.
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), seq));
        let json = serde_json::to_vec(entry)?;

        tokio::fs::write(&tmp, &json).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/* ----------------------------
In-memory store
---------------------------- */

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<CacheEntry>, CacheError> {
        let g = self
            .inner
            .read()
            .map_err(|_| CacheError::Unavailable("memory store lock poisoned".into()))?;
        Ok(g.get(id).cloned())
    }

    async fn store(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let mut g = self
            .inner
            .write()
            .map_err(|_| CacheError::Unavailable("memory store lock poisoned".into()))?;
        g.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/* ----------------------------
TTL layer
---------------------------- */

#[derive(Clone)]
pub struct FreshnessCache {
    store: Arc<dyn EntryStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl FreshnessCache {
    pub fn new(store: Arc<dyn EntryStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock, ttl }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), DEFAULT_TTL, Arc::new(SystemClock))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    /// Fresh value or `None`. Never-written, expired and unreadable all look the same.
    pub async fn get(&self, id: &str) -> Option<Classification> {
        match self.store.load(id).await {
            Ok(Some(entry)) => match self.age_ms(&entry) {
                age if age < 0 => {
                    warn!(target: "cache", %id, written_ms = entry.timestamp, "entry timestamp in the future; treating as miss");
                    None
                }
                age if age < self.ttl_ms() => Some(entry.data),
                _ => {
                    debug!(target: "cache", %id, written_ms = entry.timestamp, "entry expired");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(target: "cache", %id, error = %e, store = self.store.name(), "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Upsert with `timestamp = now`.
    pub async fn put(&self, id: &str, value: &Classification) -> Result<(), CacheError> {
        let entry = CacheEntry {
            id: id.to_string(),
            data: value.clone(),
            timestamp: self.clock.now().timestamp_millis(),
        };
        self.store.store(&entry).await
    }

    fn ttl_ms(&self) -> i64 {
        i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Negative when the entry claims to be written after `now`.
    fn age_ms(&self, entry: &CacheEntry) -> i64 {
        self.clock.now().timestamp_millis().saturating_sub(entry.timestamp)
    }
}
