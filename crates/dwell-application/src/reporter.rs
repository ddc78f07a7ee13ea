//! Heartbeat / partial / close reporters.
//!
//! Every attempt first asks the connectivity oracle. Offline reports go to
//! the offline queue; online reports get exactly one delivery attempt.

use crate::queue::OfflineQueue;
use dwell_core::report::{
    CloseReason, ConnectivityOracle, DeliveryOutcome, QueueItem, ReplaySummary, UsageCollector,
    send_item,
};
use std::sync::Arc;
use std::time::Duration;

pub struct Reporter {
    collector: Arc<dyn UsageCollector>,
    connectivity: Arc<dyn ConnectivityOracle>,
    queue: Arc<OfflineQueue>,
    timeout: Duration,
}

impl Reporter {
    pub fn new(
        collector: Arc<dyn UsageCollector>,
        connectivity: Arc<dyn ConnectivityOracle>,
        queue: Arc<OfflineQueue>,
        timeout: Duration,
    ) -> Self {
        Self {
            collector,
            connectivity,
            queue,
            timeout,
        }
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    pub async fn heartbeat(&self, session_id: &str) -> DeliveryOutcome {
        self.deliver(QueueItem::heartbeat(session_id)).await
    }

    pub async fn partial(&self, session_id: &str, active_ms: u64) -> DeliveryOutcome {
        self.deliver(QueueItem::partial(session_id, active_ms)).await
    }

    pub async fn close(
        &self,
        session_id: &str,
        active_ms: u64,
        reason: CloseReason,
    ) -> DeliveryOutcome {
        self.deliver(QueueItem::close(session_id, active_ms, reason))
            .await
    }

    /// Attempts one report.
    ///
    /// - offline: appended to the queue (`Queued`)
    /// - online with older items still queued: the queue is replayed first;
    ///   if anything is left behind, this item queues behind it
    /// - online, call fails: heartbeat/partial are `Dropped`; a close is
    ///   queued instead so the session total is never lost
    pub async fn deliver(&self, item: QueueItem) -> DeliveryOutcome {
        if !self.connectivity.is_reachable().await {
            return self.enqueue(item).await;
        }

        if !self.queue.is_empty().await {
            self.queue.replay(self.collector.as_ref(), self.timeout).await;
            if !self.queue.is_empty().await {
                return self.enqueue(item).await;
            }
        }

        let attempt = send_item(self.collector.as_ref(), &item);
        let failure = match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(())) => return DeliveryOutcome::Delivered,
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("timed out after {} ms", self.timeout.as_millis()),
        };

        if item.is_close() {
            tracing::warn!(
                "[Reporter] Close for session {} failed ({}); queueing for replay",
                item.session_id(),
                failure
            );
            return self.enqueue(item).await;
        }

        tracing::debug!(
            "[Reporter] Dropping {} for session {}: {}",
            item.kind(),
            item.session_id(),
            failure
        );
        DeliveryOutcome::dropped(failure)
    }

    async fn enqueue(&self, item: QueueItem) -> DeliveryOutcome {
        let kind = item.kind();
        match self.queue.enqueue(item).await {
            Ok(()) => DeliveryOutcome::Queued,
            Err(err) => {
                tracing::warn!("[Reporter] Failed to queue {} report: {}", kind, err);
                DeliveryOutcome::dropped(format!("queue write failed: {}", err))
            }
        }
    }

    /// Replays the offline queue if the device is reachable.
    ///
    /// Returns `None` when offline.
    pub async fn replay_queue(&self) -> Option<ReplaySummary> {
        if !self.connectivity.is_reachable().await {
            tracing::debug!("[Reporter] Offline; skipping queue replay");
            return None;
        }
        Some(self.queue.replay(self.collector.as_ref(), self.timeout).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingCollector;
    use dwell_infrastructure::{InMemoryStore, ManualConnectivity};

    struct Fixture {
        store: InMemoryStore,
        collector: RecordingCollector,
        connectivity: ManualConnectivity,
        reporter: Reporter,
    }

    fn fixture(online: bool) -> Fixture {
        let store = InMemoryStore::new();
        let collector = RecordingCollector::new();
        let connectivity = ManualConnectivity::new(online);
        let queue = Arc::new(OfflineQueue::new(Arc::new(store.clone()), "queue"));
        let reporter = Reporter::new(
            Arc::new(collector.clone()),
            Arc::new(connectivity.clone()),
            queue,
            Duration::from_secs(1),
        );
        Fixture {
            store,
            collector,
            connectivity,
            reporter,
        }
    }

    #[tokio::test]
    async fn test_online_delivers() {
        let f = fixture(true);
        assert_eq!(f.reporter.partial("s-1", 1_500).await, DeliveryOutcome::Delivered);
        assert_eq!(f.collector.calls(), vec![QueueItem::partial("s-1", 1_500)]);
        assert!(f.reporter.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_offline_queues_without_attempting() {
        let f = fixture(false);
        assert_eq!(f.reporter.heartbeat("s-1").await, DeliveryOutcome::Queued);
        assert_eq!(f.collector.attempts(), 0);
        assert_eq!(f.reporter.queue().items().await, vec![QueueItem::heartbeat("s-1")]);
    }

    #[tokio::test]
    async fn test_online_failure_drops_partial_but_queues_close() {
        let f = fixture(true);
        f.collector.fail_all();

        let outcome = f.reporter.partial("s-1", 10).await;
        assert!(matches!(outcome, DeliveryOutcome::Dropped { .. }));
        assert!(f.reporter.queue().is_empty().await);

        let outcome = f.reporter.close("s-1", 10, CloseReason::Logout).await;
        assert_eq!(outcome, DeliveryOutcome::Queued);
        assert_eq!(
            f.reporter.queue().items().await,
            vec![QueueItem::close("s-1", 10, CloseReason::Logout)]
        );
    }

    #[tokio::test]
    async fn test_queue_write_failure_is_dropped() {
        let f = fixture(false);
        f.store.fail_writes(true);
        assert!(matches!(
            f.reporter.heartbeat("s-1").await,
            DeliveryOutcome::Dropped { .. }
        ));
    }

    #[tokio::test]
    async fn test_queued_items_go_out_before_new_report() {
        let f = fixture(false);
        f.reporter.partial("s-1", 0).await;

        f.connectivity.set_reachable(true);
        assert_eq!(f.reporter.heartbeat("s-1").await, DeliveryOutcome::Delivered);

        assert_eq!(
            f.collector.calls(),
            vec![QueueItem::partial("s-1", 0), QueueItem::heartbeat("s-1")]
        );
        assert!(f.reporter.queue().is_empty().await);
    }

    #[tokio::test]
    async fn test_replay_queue_skipped_offline() {
        let f = fixture(false);
        f.reporter.partial("s-1", 0).await;
        assert!(f.reporter.replay_queue().await.is_none());

        f.connectivity.set_reachable(true);
        let summary = f.reporter.replay_queue().await.unwrap();
        assert_eq!(summary.delivered, 1);
    }
}
