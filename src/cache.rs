//! In-memory mapping from remote identifiers to node metadata.
//!
//! The mapping starts empty and is replaced wholesale on every refresh.
//! Lookups that miss trigger a single refresh through [`FileMappingCache::ensure`].
//! Entries can go stale when the remote account changes behind the proxy's
//! back; nothing tries to keep them in sync.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::storage::{FileRecord, SharedStorage, StorageError};

/// Identifier to metadata cache backed by a remote storage client.
pub struct FileMappingCache {
    storage: SharedStorage,
    entries: RwLock<HashMap<String, FileRecord>>,
}

impl FileMappingCache {
    /// Create an empty cache.
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            storage,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Remote storage client this cache refreshes from.
    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Replace the whole mapping with a fresh remote listing.
    ///
    /// On failure the previous mapping is kept as is.
    pub async fn refresh(&self) -> Result<usize, StorageError> {
        let listing = self.storage.list().await?;
        let count = listing.len();

        *self.entries.write().await = listing;
        tracing::debug!(count, "File mapping refreshed");

        Ok(count)
    }

    /// Look up a cached record without touching the remote account.
    pub async fn lookup(&self, id: &str) -> Option<FileRecord> {
        self.entries.read().await.get(id).cloned()
    }

    /// Look up a record, refreshing once if it is not cached.
    ///
    /// `Ok(None)` means the identifier is unknown even after the refresh.
    pub async fn ensure(&self, id: &str) -> Result<Option<FileRecord>, StorageError> {
        if let Some(record) = self.lookup(id).await {
            return Ok(Some(record));
        }

        tracing::debug!(id, "Identifier not cached, refreshing");
        self.refresh().await?;
        Ok(self.lookup(id).await)
    }

    /// Drop a single entry, returning it if it was cached.
    pub async fn evict(&self, id: &str) -> Option<FileRecord> {
        self.entries.write().await.remove(id)
    }
}
