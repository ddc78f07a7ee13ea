//! Stale-session recovery.
//!
//! Runs once at startup, before any new session is created, and finishes a
//! session left behind by a process that was killed.

use crate::history::HistoryArchive;
use crate::reporter::Reporter;
use chrono::{DateTime, Utc};
use dwell_core::clock::elapsed_ms;
use dwell_core::config::ForegroundRecoveryPolicy;
use dwell_core::history::HistoryEntry;
use dwell_core::report::{CloseReason, DeliveryOutcome, QueueItem};
use dwell_core::session::SessionState;
use dwell_core::store::{KeyValueStore, StoreExt};
use std::sync::Arc;

/// What startup recovery did with the persisted session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    NothingToRecover,
    /// Process died while backgrounded; the close was attempted.
    ClosedBackgrounded {
        session_id: String,
        active_ms: u64,
        outcome: DeliveryOutcome,
    },
    /// Process died while foregrounded and the policy discards such sessions.
    DiscardedForegrounded { session_id: String },
    /// Process died while foregrounded; closed at its last heartbeat.
    ClosedForegrounded {
        session_id: String,
        active_ms: u64,
        outcome: DeliveryOutcome,
    },
    /// The stored record did not parse and was removed.
    DiscardedCorrupt,
}

pub struct StaleSessionRecovery {
    store: Arc<dyn KeyValueStore>,
    session_key: String,
    reporter: Arc<Reporter>,
    history: Arc<HistoryArchive>,
    policy: ForegroundRecoveryPolicy,
}

impl StaleSessionRecovery {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        session_key: impl Into<String>,
        reporter: Arc<Reporter>,
        history: Arc<HistoryArchive>,
        policy: ForegroundRecoveryPolicy,
    ) -> Self {
        Self {
            store,
            session_key: session_key.into(),
            reporter,
            history,
            policy,
        }
    }

    pub async fn run(&self) -> RecoveryOutcome {
        let state = match self.store.load_json::<SessionState>(&self.session_key).await {
            Ok(Some(state)) => state,
            Ok(None) => return RecoveryOutcome::NothingToRecover,
            Err(err) if err.is_serialization() => {
                tracing::warn!("[Recovery] Discarding unreadable session record: {}", err);
                self.remove_record().await;
                return RecoveryOutcome::DiscardedCorrupt;
            }
            Err(err) => {
                tracing::warn!("[Recovery] Could not read session record: {}", err);
                return RecoveryOutcome::NothingToRecover;
            }
        };

        match (state.foreground_since, state.pause_at) {
            (None, Some(pause_at)) => {
                let active_ms = state.active_ms;
                let outcome = self.close(&state, pause_at, active_ms).await;
                RecoveryOutcome::ClosedBackgrounded {
                    session_id: state.session_id,
                    active_ms,
                    outcome,
                }
            }
            (Some(since), _) => match self.policy {
                ForegroundRecoveryPolicy::Discard => {
                    tracing::warn!(
                        "[Recovery] Session {} was still foregrounded; discarding without a close",
                        state.session_id
                    );
                    self.remove_record().await;
                    RecoveryOutcome::DiscardedForegrounded {
                        session_id: state.session_id,
                    }
                }
                ForegroundRecoveryPolicy::CloseAtLastHeartbeat => {
                    let ended_at = state.last_heartbeat_at;
                    let active_ms = state.active_ms + elapsed_ms(since, ended_at);
                    let outcome = self.close(&state, ended_at, active_ms).await;
                    RecoveryOutcome::ClosedForegrounded {
                        session_id: state.session_id,
                        active_ms,
                        outcome,
                    }
                }
            },
            (None, None) => {
                tracing::warn!(
                    "[Recovery] Session {} has no open span; discarding",
                    state.session_id
                );
                self.remove_record().await;
                RecoveryOutcome::DiscardedForegrounded {
                    session_id: state.session_id,
                }
            }
        }
    }

    /// Sends the close, then archives and clears the record only if the
    /// close was delivered or queued.
    async fn close(
        &self,
        state: &SessionState,
        ended_at: DateTime<Utc>,
        active_ms: u64,
    ) -> DeliveryOutcome {
        tracing::info!(
            "[Recovery] Closing stale session {} with {} ms active",
            state.session_id,
            active_ms
        );

        let outcome = self
            .reporter
            .deliver(QueueItem::close(&state.session_id, active_ms, CloseReason::Close))
            .await;

        if !outcome.is_durable() {
            tracing::warn!(
                "[Recovery] Close for session {} was lost; keeping record for next start",
                state.session_id
            );
            return outcome;
        }

        let entry = HistoryEntry::finalize(state, ended_at, active_ms, CloseReason::Close);
        if let Err(err) = self.history.append(entry).await {
            tracing::warn!("[Recovery] Failed to archive session {}: {}", state.session_id, err);
        }
        self.remove_record().await;
        outcome
    }

    async fn remove_record(&self) {
        if let Err(err) = self.store.remove(&self.session_key).await {
            tracing::warn!("[Recovery] Failed to remove session record: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::OfflineQueue;
    use crate::test_support::RecordingCollector;
    use dwell_core::session::DeviceMetadata;
    use dwell_infrastructure::{InMemoryStore, ManualConnectivity};
    use std::time::Duration;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000 + ms).unwrap()
    }

    struct Fixture {
        store: InMemoryStore,
        collector: RecordingCollector,
        queue: Arc<OfflineQueue>,
        history: Arc<HistoryArchive>,
        recovery: StaleSessionRecovery,
    }

    fn fixture(online: bool, policy: ForegroundRecoveryPolicy) -> Fixture {
        let store = InMemoryStore::new();
        let shared: Arc<dyn KeyValueStore> = Arc::new(store.clone());
        let collector = RecordingCollector::new();
        let queue = Arc::new(OfflineQueue::new(shared.clone(), "queue"));
        let reporter = Arc::new(Reporter::new(
            Arc::new(collector.clone()),
            Arc::new(ManualConnectivity::new(online)),
            queue.clone(),
            Duration::from_secs(1),
        ));
        let history = Arc::new(HistoryArchive::new(shared.clone(), "history", 200));
        let recovery =
            StaleSessionRecovery::new(shared, "session", reporter, history.clone(), policy);
        Fixture {
            store,
            collector,
            queue,
            history,
            recovery,
        }
    }

    fn backgrounded() -> SessionState {
        let mut state = SessionState::begin("user-1", at(0), DeviceMetadata::default());
        state.pause(at(7_000));
        state
    }

    #[tokio::test]
    async fn test_nothing_to_recover() {
        let f = fixture(true, ForegroundRecoveryPolicy::Discard);
        assert_eq!(f.recovery.run().await, RecoveryOutcome::NothingToRecover);
    }

    #[tokio::test]
    async fn test_backgrounded_session_is_closed_and_archived() {
        let f = fixture(true, ForegroundRecoveryPolicy::Discard);
        let state = backgrounded();
        f.store.save_json("session", &state).await.unwrap();

        let outcome = f.recovery.run().await;

        assert_eq!(
            outcome,
            RecoveryOutcome::ClosedBackgrounded {
                session_id: state.session_id.clone(),
                active_ms: 7_000,
                outcome: DeliveryOutcome::Delivered,
            }
        );
        assert_eq!(
            f.collector.calls(),
            vec![QueueItem::close(&state.session_id, 7_000, CloseReason::Close)]
        );
        let history = f.history.all().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].ended_at, at(7_000));
        assert_eq!(history[0].reason, CloseReason::Close);
        assert!(f.store.get("session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_backgrounded_session_offline_is_queued() {
        let f = fixture(false, ForegroundRecoveryPolicy::Discard);
        let state = backgrounded();
        f.store.save_json("session", &state).await.unwrap();

        let outcome = f.recovery.run().await;

        assert!(matches!(
            outcome,
            RecoveryOutcome::ClosedBackgrounded {
                outcome: DeliveryOutcome::Queued,
                ..
            }
        ));
        assert_eq!(f.queue.len().await, 1);
        assert!(f.store.get("session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lost_close_keeps_record() {
        let f = fixture(false, ForegroundRecoveryPolicy::Discard);
        let state = backgrounded();
        f.store.save_json("session", &state).await.unwrap();
        f.store.fail_writes(true);

        let outcome = f.recovery.run().await;

        assert!(matches!(
            outcome,
            RecoveryOutcome::ClosedBackgrounded {
                outcome: DeliveryOutcome::Dropped { .. },
                ..
            }
        ));
        f.store.fail_writes(false);
        assert!(f.store.get("session").await.unwrap().is_some());
        assert!(f.history.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_foregrounded_session_discarded_by_default() {
        let f = fixture(true, ForegroundRecoveryPolicy::Discard);
        let state = SessionState::begin("user-1", at(0), DeviceMetadata::default());
        f.store.save_json("session", &state).await.unwrap();

        assert_eq!(
            f.recovery.run().await,
            RecoveryOutcome::DiscardedForegrounded {
                session_id: state.session_id
            }
        );
        assert!(f.collector.calls().is_empty());
        assert!(f.history.all().await.is_empty());
        assert!(f.store.get("session").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_foregrounded_session_closed_at_last_heartbeat() {
        let f = fixture(true, ForegroundRecoveryPolicy::CloseAtLastHeartbeat);
        let mut state = SessionState::begin("user-1", at(0), DeviceMetadata::default());
        state.pause(at(2_000));
        state.resume(at(5_000));
        state.last_heartbeat_at = at(35_000);
        f.store.save_json("session", &state).await.unwrap();

        let outcome = f.recovery.run().await;

        assert!(matches!(
            outcome,
            RecoveryOutcome::ClosedForegrounded { active_ms: 32_000, .. }
        ));
        assert_eq!(f.history.all().await[0].ended_at, at(35_000));
    }

    #[tokio::test]
    async fn test_corrupt_record_is_removed() {
        let f = fixture(true, ForegroundRecoveryPolicy::Discard);
        f.store.set("session", "{\"session_id\":".to_string()).await.unwrap();

        assert_eq!(f.recovery.run().await, RecoveryOutcome::DiscardedCorrupt);
        assert!(f.store.get("session").await.unwrap().is_none());
    }
}
