//! Report dispatcher.
//!
//! Transitions never wait on the network. They hand reports to this worker,
//! which delivers them one at a time in submission order and publishes every
//! outcome on a broadcast channel.

use crate::reporter::Reporter;
use dwell_core::report::{QueueItem, ReportOutcome};
use dwell_core::session::SessionState;
use dwell_core::store::{KeyValueStore, StoreExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

const OUTCOME_CAPACITY: usize = 256;

enum Command {
    Report(QueueItem),
    Replay,
    Flush(oneshot::Sender<()>),
}

/// Handle to the dispatch worker. Cloning shares the same worker.
#[derive(Clone)]
pub struct ReportDispatcher {
    tx: mpsc::UnboundedSender<Command>,
    outcomes: broadcast::Sender<ReportOutcome>,
}

impl ReportDispatcher {
    /// Spawns the worker on the current runtime.
    ///
    /// `store`/`session_key` locate the persisted session record, which the
    /// worker removes once that session's close is delivered or queued.
    pub fn spawn(
        reporter: Arc<Reporter>,
        store: Arc<dyn KeyValueStore>,
        session_key: impl Into<String>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (outcomes, _) = broadcast::channel(OUTCOME_CAPACITY);

        let worker = Worker {
            reporter,
            store,
            session_key: session_key.into(),
            outcomes: outcomes.clone(),
        };
        tokio::spawn(worker.run(rx));

        Self { tx, outcomes }
    }

    pub fn submit(&self, item: QueueItem) {
        if self.tx.send(Command::Report(item)).is_err() {
            tracing::warn!("[ReportDispatcher] Worker stopped; report discarded");
        }
    }

    /// Asks the worker to replay the offline queue after whatever is already
    /// pending.
    pub fn replay(&self) {
        let _ = self.tx.send(Command::Replay);
    }

    /// Resolves once every command submitted before this call is processed.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReportOutcome> {
        self.outcomes.subscribe()
    }
}

struct Worker {
    reporter: Arc<Reporter>,
    store: Arc<dyn KeyValueStore>,
    session_key: String,
    outcomes: broadcast::Sender<ReportOutcome>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Report(item) => self.deliver(item).await,
                Command::Replay => {
                    if let Some(summary) = self.reporter.replay_queue().await {
                        tracing::debug!(
                            "[ReportDispatcher] Replay: {} delivered, {} requeued",
                            summary.delivered,
                            summary.requeued
                        );
                    }
                }
                Command::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        tracing::debug!("[ReportDispatcher] Worker stopped");
    }

    async fn deliver(&self, item: QueueItem) {
        let outcome = self.reporter.deliver(item.clone()).await;

        if item.is_close() && outcome.is_durable() {
            self.release_session(item.session_id()).await;
        }

        // No receivers is fine.
        let _ = self.outcomes.send(ReportOutcome { item, outcome });
    }

    /// Removes the persisted record if it still belongs to `session_id`.
    async fn release_session(&self, session_id: &str) {
        let stored = match self.store.load_json::<SessionState>(&self.session_key).await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!("[ReportDispatcher] Could not read session record: {}", err);
                return;
            }
        };

        if stored.is_some_and(|state| state.session_id == session_id) {
            if let Err(err) = self.store.remove(&self.session_key).await {
                tracing::warn!(
                    "[ReportDispatcher] Failed to clear session {}: {}",
                    session_id,
                    err
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::OfflineQueue;
    use crate::test_support::RecordingCollector;
    use chrono::Utc;
    use dwell_core::report::{CloseReason, DeliveryOutcome};
    use dwell_core::session::DeviceMetadata;
    use dwell_infrastructure::{InMemoryStore, ManualConnectivity};
    use std::time::Duration;

    struct Fixture {
        store: InMemoryStore,
        collector: RecordingCollector,
        connectivity: ManualConnectivity,
        dispatcher: ReportDispatcher,
    }

    fn fixture(online: bool) -> Fixture {
        let store = InMemoryStore::new();
        let collector = RecordingCollector::new();
        let connectivity = ManualConnectivity::new(online);
        let shared: Arc<dyn KeyValueStore> = Arc::new(store.clone());
        let queue = Arc::new(OfflineQueue::new(shared.clone(), "queue"));
        let reporter = Arc::new(Reporter::new(
            Arc::new(collector.clone()),
            Arc::new(connectivity.clone()),
            queue,
            Duration::from_secs(1),
        ));
        let dispatcher = ReportDispatcher::spawn(reporter, shared, "session");
        Fixture {
            store,
            collector,
            connectivity,
            dispatcher,
        }
    }

    async fn persist(store: &InMemoryStore, state: &SessionState) {
        store.save_json("session", state).await.unwrap();
    }

    #[tokio::test]
    async fn test_reports_delivered_in_submission_order() {
        let f = fixture(true);
        let mut outcomes = f.dispatcher.subscribe();

        f.dispatcher.submit(QueueItem::partial("s-1", 0));
        f.dispatcher.submit(QueueItem::heartbeat("s-1"));
        f.dispatcher.flush().await;

        assert_eq!(
            f.collector.calls(),
            vec![QueueItem::partial("s-1", 0), QueueItem::heartbeat("s-1")]
        );
        let first = outcomes.recv().await.unwrap();
        assert_eq!(first.item, QueueItem::partial("s-1", 0));
        assert_eq!(first.outcome, DeliveryOutcome::Delivered);
    }

    #[tokio::test]
    async fn test_durable_close_releases_matching_session() {
        let f = fixture(false);
        let state = SessionState::begin("user-1", Utc::now(), DeviceMetadata::default());
        persist(&f.store, &state).await;

        f.dispatcher
            .submit(QueueItem::close(&state.session_id, 100, CloseReason::Logout));
        f.dispatcher.flush().await;

        assert!(f.store.get("session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_for_other_session_keeps_record() {
        let f = fixture(true);
        let state = SessionState::begin("user-1", Utc::now(), DeviceMetadata::default());
        persist(&f.store, &state).await;

        f.dispatcher
            .submit(QueueItem::close("older-session", 100, CloseReason::Close));
        f.dispatcher.flush().await;

        assert!(f.store.get("session").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lost_close_keeps_record() {
        let f = fixture(false);
        let state = SessionState::begin("user-1", Utc::now(), DeviceMetadata::default());
        persist(&f.store, &state).await;
        f.store.fail_writes(true);

        f.dispatcher
            .submit(QueueItem::close(&state.session_id, 100, CloseReason::Close));
        f.dispatcher.flush().await;

        f.store.fail_writes(false);
        assert!(f.store.get("session").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_replay_command_drains_queue() {
        let f = fixture(false);
        f.dispatcher.submit(QueueItem::partial("s-1", 0));
        f.dispatcher.flush().await;
        assert!(f.collector.calls().is_empty());

        f.connectivity.set_reachable(true);
        f.dispatcher.replay();
        f.dispatcher.flush().await;

        assert_eq!(f.collector.calls(), vec![QueueItem::partial("s-1", 0)]);
    }
}
