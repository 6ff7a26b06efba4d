//! Typed access to the crawl snapshot held in a [`KvStore`].
//!
//! A snapshot occupies two keys: the passage collection and its metadata.
//! Writers store passages first and metadata second; readers only trust
//! metadata once the passage key is present.

use std::sync::Arc;

use tracing::debug;

use groundwork_shared::{CacheConfig, CacheMetadata, CacheSnapshot, GroundworkError, Passage, Result};

use crate::kv::{KvStore, MemoryKv, SqliteKv};

/// Snapshot view over a key/value store.
#[derive(Clone)]
pub struct SnapshotStore {
    kv: Arc<dyn KvStore>,
    passages_key: String,
    metadata_key: String,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("passages_key", &self.passages_key)
            .field("metadata_key", &self.metadata_key)
            .finish_non_exhaustive()
    }
}

impl SnapshotStore {
    pub fn new(kv: Arc<dyn KvStore>, config: &CacheConfig) -> Self {
        Self {
            kv,
            passages_key: config.passages_key.clone(),
            metadata_key: config.metadata_key.clone(),
        }
    }

    /// Open (creating if needed) the configured libSQL cache file.
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        let kv = SqliteKv::open(&config.resolved_db_path()?).await?;
        Ok(Self::new(Arc::new(kv), config))
    }

    /// Open the configured cache file for reading only.
    pub async fn open_readonly(config: &CacheConfig) -> Result<Self> {
        let kv = SqliteKv::open_readonly(&config.resolved_db_path()?).await?;
        Ok(Self::new(Arc::new(kv), config))
    }

    /// Empty in-memory store using the configured key names.
    pub fn in_memory(config: &CacheConfig) -> Self {
        Self::new(Arc::new(MemoryKv::new()), config)
    }

    /// Cached passages, or `None` before the first successful crawl.
    pub async fn read_passages(&self) -> Result<Option<Vec<Passage>>> {
        let Some(raw) = self.kv.get(&self.passages_key).await? else {
            return Ok(None);
        };
        let passages: Vec<Passage> = serde_json::from_str(&raw).map_err(|e| {
            GroundworkError::parse(format!("corrupt cache entry '{}': {e}", self.passages_key))
        })?;
        debug!(count = passages.len(), "read cached passages");
        Ok(Some(passages))
    }

    /// Crawl metadata, only when the passage collection is also present.
    pub async fn read_metadata(&self) -> Result<Option<CacheMetadata>> {
        if self.kv.get(&self.passages_key).await?.is_none() {
            return Ok(None);
        }
        let Some(raw) = self.kv.get(&self.metadata_key).await? else {
            return Ok(None);
        };
        let metadata = serde_json::from_str(&raw).map_err(|e| {
            GroundworkError::parse(format!("corrupt cache entry '{}': {e}", self.metadata_key))
        })?;
        Ok(Some(metadata))
    }

    /// The full snapshot, when both halves are present.
    pub async fn read_snapshot(&self) -> Result<Option<CacheSnapshot>> {
        let Some(passages) = self.read_passages().await? else {
            return Ok(None);
        };
        let Some(metadata) = self.read_metadata().await? else {
            return Ok(None);
        };
        Ok(Some(CacheSnapshot { passages, metadata }))
    }

    /// Replace the stored snapshot wholesale: passages, then metadata.
    pub async fn write_snapshot(&self, snapshot: &CacheSnapshot) -> Result<()> {
        let passages = serde_json::to_string(&snapshot.passages)
            .map_err(|e| GroundworkError::parse(format!("failed to serialize passages: {e}")))?;
        let metadata = serde_json::to_string(&snapshot.metadata)
            .map_err(|e| GroundworkError::parse(format!("failed to serialize metadata: {e}")))?;

        self.kv.set(&self.passages_key, &passages).await?;
        self.kv.set(&self.metadata_key, &metadata).await?;
        debug!(count = snapshot.passages.len(), "wrote cache snapshot");
        Ok(())
    }
}
