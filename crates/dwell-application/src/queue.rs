//! Offline report queue.
//!
//! An ordered, persisted list of reports that could not be sent because the
//! device was offline. Items are only ever appended at the tail and removed
//! from the head, which is what lets a replay pass reconcile with items that
//! were appended while it was running.

use dwell_core::error::Result;
use dwell_core::report::{QueueItem, ReplaySummary, UsageCollector, send_item};
use dwell_core::store::{KeyValueStore, StoreExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
    key: String,
    /// Serializes read-modify-write cycles on the stored list.
    write_lock: Mutex<()>,
    /// Keeps replay passes from overlapping.
    replay_lock: Mutex<()>,
    /// Bumped by `clear`, under `write_lock`.
    generation: AtomicU64,
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            write_lock: Mutex::new(()),
            replay_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Reads the stored list. A corrupt list reads as empty and is replaced
    /// on the next write.
    async fn load(&self) -> Result<Vec<QueueItem>> {
        match self.store.load_json::<Vec<QueueItem>>(&self.key).await {
            Ok(items) => Ok(items.unwrap_or_default()),
            Err(err) if err.is_serialization() => {
                tracing::warn!("[OfflineQueue] Discarding unreadable queue: {}", err);
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    async fn save(&self, items: &Vec<QueueItem>) -> Result<()> {
        if items.is_empty() {
            self.store.remove(&self.key).await
        } else {
            self.store.save_json(&self.key, items).await
        }
    }

    /// Appends `item` at the tail.
    pub async fn enqueue(&self, item: QueueItem) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load().await?;
        tracing::debug!(
            "[OfflineQueue] Queueing {} for session {} (depth {})",
            item.kind(),
            item.session_id(),
            items.len() + 1
        );
        items.push(item);
        self.save(&items).await
    }

    /// Snapshot of the queue in insertion order. Read failures yield an
    /// empty list.
    pub async fn items(&self) -> Vec<QueueItem> {
        match self.load().await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!("[OfflineQueue] Failed to read queue: {}", err);
                Vec::new()
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.items().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items().await.is_empty()
    }

    pub async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.store.remove(&self.key).await
    }

    /// Sends every queued item to `collector` in insertion order.
    ///
    /// Stops at the first item that fails or times out; that item and
    /// everything after it stay queued, in order, ahead of anything appended
    /// during the pass. Delivered items are removed. The caller is expected
    /// to have checked connectivity. If the queue is cleared during the
    /// pass, nothing from the snapshot is written back.
    pub async fn replay(&self, collector: &dyn UsageCollector, timeout: Duration) -> ReplaySummary {
        let _replay = self.replay_lock.lock().await;

        let (snapshot, generation) = {
            let _guard = self.write_lock.lock().await;
            (self.items().await, self.generation.load(Ordering::SeqCst))
        };
        if snapshot.is_empty() {
            return ReplaySummary::default();
        }

        tracing::info!("[OfflineQueue] Replaying {} queued report(s)", snapshot.len());

        let mut delivered = 0;
        for item in &snapshot {
            match tokio::time::timeout(timeout, send_item(collector, item)).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    tracing::warn!(
                        "[OfflineQueue] Replay of {} for session {} failed: {}",
                        item.kind(),
                        item.session_id(),
                        err
                    );
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        "[OfflineQueue] Replay of {} for session {} timed out",
                        item.kind(),
                        item.session_id()
                    );
                    break;
                }
            }
        }

        let mut summary = ReplaySummary {
            delivered,
            requeued: snapshot.len() - delivered,
        };

        let _guard = self.write_lock.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::info!(
                "[OfflineQueue] Queue cleared during replay; dropping {} undelivered report(s)",
                summary.requeued
            );
            summary.requeued = 0;
            return summary;
        }

        let current = match self.load().await {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!("[OfflineQueue] Failed to reload queue after replay: {}", err);
                return summary;
            }
        };

        // Everything past the snapshot was appended during the pass.
        let appended = current.get(snapshot.len()..).unwrap_or_default();
        let mut remaining: Vec<QueueItem> = snapshot[delivered..].to_vec();
        remaining.extend_from_slice(appended);

        if let Err(err) = self.save(&remaining).await {
            tracing::warn!("[OfflineQueue] Failed to persist queue after replay: {}", err);
        }

        tracing::info!(
            "[OfflineQueue] Replay finished: {} delivered, {} requeued",
            summary.delivered,
            summary.requeued
        );
        summary
    }
}
