//! Snapshot persistence over a key-value cache boundary.
//!
//! The backend's transport and auth are out of scope — `KvBackend` is
//! the interface contract (get / set / push-front / trim, the usual
//! cache-list shape). A JSON-file-backed implementation ships for
//! single-host deployments; tests mock the trait. The "latest" slot and
//! the history list are independent writes, not a transaction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::types::{HistoryEntry, MonitorError, Snapshot};

/// Cache key of the most recent snapshot.
const LATEST_KEY: &str = "metalwatch:latest";
/// Cache key of the bounded history list.
const HISTORY_KEY: &str = "metalwatch:history";

// ---------------------------------------------------------------------------
// Key-value boundary
// ---------------------------------------------------------------------------

/// Abstraction over the external key-value cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Read a plain key. `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite a plain key.
    async fn set(&self, key: &str, value: String) -> Result<()>;

    /// Prepend a value to a list key (newest first).
    async fn push_front(&self, list_key: &str, value: String) -> Result<()>;

    /// Truncate a list key to the inclusive index range `start..=stop`.
    async fn trim(&self, list_key: &str, start: usize, stop: usize) -> Result<()>;
}

// ---------------------------------------------------------------------------
// File-backed cache
// ---------------------------------------------------------------------------

/// On-disk document behind `FileCache`: plain entries plus ordered
/// lists, serialized as one JSON file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default)]
    entries: HashMap<String, String>,
    #[serde(default)]
    lists: HashMap<String, Vec<String>>,
}

/// JSON-file key-value cache. Each operation reads and rewrites the
/// whole document; the data set is a handful of keys per run.
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_document(&self) -> Result<CacheDocument> {
        if !self.path.exists() {
            return Ok(CacheDocument::default());
        }
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read cache file {}", self.path.display()))?;
        let doc = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse cache file {}", self.path.display()))?;
        Ok(doc)
    }

    fn write_document(&self, doc: &CacheDocument) -> Result<()> {
        let json = serde_json::to_string(doc).context("Failed to serialise cache document")?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to write cache file {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl KvBackend for FileCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_document()?.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut doc = self.read_document()?;
        doc.entries.insert(key.to_string(), value);
        self.write_document(&doc)
    }

    async fn push_front(&self, list_key: &str, value: String) -> Result<()> {
        let mut doc = self.read_document()?;
        doc.lists.entry(list_key.to_string()).or_default().insert(0, value);
        self.write_document(&doc)
    }

    async fn trim(&self, list_key: &str, start: usize, stop: usize) -> Result<()> {
        let mut doc = self.read_document()?;
        if let Some(list) = doc.lists.get_mut(list_key) {
            let end = (stop + 1).min(list.len());
            let start = start.min(end);
            *list = list[start..end].to_vec();
        }
        self.write_document(&doc)
    }
}

// ---------------------------------------------------------------------------
// Snapshot store
// ---------------------------------------------------------------------------

/// Owns the "latest" slot and the bounded history ring. Single writer,
/// last-write-wins.
pub struct SnapshotStore {
    backend: Box<dyn KvBackend>,
    history_capacity: usize,
}

impl SnapshotStore {
    pub fn new(backend: Box<dyn KvBackend>, history_capacity: usize) -> Self {
        Self {
            backend,
            history_capacity,
        }
    }

    /// Unconditionally overwrite the latest snapshot. Best-effort: the
    /// caller logs a failure and keeps the snapshot it already produced.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), MonitorError> {
        let json = serde_json::to_string(snapshot)
            .map_err(|e| MonitorError::PersistenceFailure(e.to_string()))?;
        self.backend
            .set(LATEST_KEY, json)
            .await
            .map_err(|e| MonitorError::PersistenceFailure(e.to_string()))?;
        debug!(key = LATEST_KEY, "Latest snapshot saved");
        Ok(())
    }

    /// Push one history entry and trim the ring to capacity. Only called
    /// for live-sourced runs.
    pub async fn append_history(&self, entry: &HistoryEntry) -> Result<(), MonitorError> {
        let json = serde_json::to_string(entry)
            .map_err(|e| MonitorError::PersistenceFailure(e.to_string()))?;
        self.backend
            .push_front(HISTORY_KEY, json)
            .await
            .map_err(|e| MonitorError::PersistenceFailure(e.to_string()))?;
        self.backend
            .trim(HISTORY_KEY, 0, self.history_capacity.saturating_sub(1))
            .await
            .map_err(|e| MonitorError::PersistenceFailure(e.to_string()))?;
        debug!(
            key = HISTORY_KEY,
            capacity = self.history_capacity,
            "History entry appended"
        );
        Ok(())
    }

    /// Load the stored latest snapshot, if any. Used exclusively as the
    /// fallback read when the live path fails. A corrupt entry behaves
    /// like an absent one.
    pub async fn load_latest(&self) -> Result<Option<Snapshot>, MonitorError> {
        let raw = self
            .backend
            .get(LATEST_KEY)
            .await
            .map_err(|e| MonitorError::PersistenceFailure(e.to_string()))?;

        let Some(json) = raw else {
            info!(key = LATEST_KEY, "No cached snapshot available");
            return Ok(None);
        };

        match serde_json::from_str::<Snapshot>(&json) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(key = LATEST_KEY, error = %e, "Cached snapshot is corrupt, treating as absent");
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
