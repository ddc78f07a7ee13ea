//! Finalized session history.
//!
//! Newest first, bounded. Only finalized sessions land here; the open
//! session is never visible through these reads.

use dwell_core::error::Result;
use dwell_core::history::HistoryEntry;
use dwell_core::store::{KeyValueStore, StoreExt};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct HistoryArchive {
    store: Arc<dyn KeyValueStore>,
    key: String,
    max: usize,
    lock: Mutex<()>,
}

impl HistoryArchive {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>, max: usize) -> Self {
        Self {
            store,
            key: key.into(),
            max,
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<HistoryEntry>> {
        match self.store.load_json::<Vec<HistoryEntry>>(&self.key).await {
            Ok(entries) => Ok(entries.unwrap_or_default()),
            Err(err) if err.is_serialization() => {
                tracing::warn!("[HistoryArchive] Ignoring unreadable history: {}", err);
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Prepends `entry`, dropping the oldest entries beyond the bound.
    ///
    /// An older entry for the same session is replaced, so a close that is
    /// retried at startup does not archive the session twice.
    pub async fn append(&self, entry: HistoryEntry) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.retain(|existing| existing.session_id != entry.session_id);
        entries.insert(0, entry);
        entries.truncate(self.max);
        self.store.save_json(&self.key, &entries).await
    }

    pub async fn all(&self) -> Vec<HistoryEntry> {
        match self.load().await {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!("[HistoryArchive] Failed to read history: {}", err);
                Vec::new()
            }
        }
    }

    pub async fn for_user(&self, user_id: &str) -> Vec<HistoryEntry> {
        self.all()
            .await
            .into_iter()
            .filter(|entry| entry.user_id == user_id)
            .collect()
    }

    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.store.remove(&self.key).await
    }

    /// Keeps the newest `max` entries. Returns how many were removed.
    pub async fn prune(&self, max: usize) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.len() <= max {
            return Ok(0);
        }
        let removed = entries.len() - max;
        entries.truncate(max);
        self.store.save_json(&self.key, &entries).await?;
        Ok(removed)
    }
}
