//! Session lifecycle controller.
//!
//! Owns the single open session and drives it through
//! `NoSession -> Foreground <-> Background -> NoSession` in response to app
//! lifecycle signals, timers, and explicit login/logout.
//!
//! # Concurrency
//!
//! All state sits behind one `tokio::sync::Mutex`, held for the whole of each
//! transition. Timer and listener tasks only hold a `Weak` reference and are
//! tagged with an id; a task whose id no longer matches the current handle of
//! its kind does nothing when it fires.
//!
//! Transitions never await the network: reports go to the
//! [`ReportDispatcher`], which delivers them in submission order.

use crate::dispatcher::ReportDispatcher;
use crate::history::HistoryArchive;
use crate::timer::TimerHandle;
use dwell_core::clock::Clock;
use dwell_core::config::TrackerConfig;
use dwell_core::error::{DwellError, Result};
use dwell_core::history::HistoryEntry;
use dwell_core::report::{CloseReason, QueueItem, ReportOutcome};
use dwell_core::session::{
    AppLifecycleEvent, AppLifecycleSource, DeviceMetadata, SessionPhase, SessionState,
};
use dwell_core::store::{KeyValueStore, StoreExt};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, broadcast};
use tokio::time::{Instant, MissedTickBehavior};

/// Collaborators the controller is built from.
pub struct ControllerDeps {
    pub config: TrackerConfig,
    pub store: Arc<dyn KeyValueStore>,
    pub lifecycle: Arc<dyn AppLifecycleSource>,
    pub clock: Arc<dyn Clock>,
    pub history: Arc<HistoryArchive>,
    pub dispatcher: ReportDispatcher,
    pub device: DeviceMetadata,
}

#[derive(Default)]
struct ControllerState {
    session: Option<SessionState>,
    heartbeat: Option<TimerHandle>,
    grace: Option<TimerHandle>,
    subscription: Option<TimerHandle>,
}

impl ControllerState {
    fn cancel_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat.take() {
            handle.cancel();
        }
    }

    fn cancel_grace(&mut self) {
        if let Some(handle) = self.grace.take() {
            handle.cancel();
        }
    }

    fn cancel_subscription(&mut self) {
        if let Some(handle) = self.subscription.take() {
            handle.cancel();
        }
    }

    fn phase(&self) -> SessionPhase {
        self.session
            .as_ref()
            .map_or(SessionPhase::NoSession, SessionState::phase)
    }
}

struct Shared {
    deps: ControllerDeps,
    state: Mutex<ControllerState>,
}

/// Cheaply clonable handle to the lifecycle state machine.
#[derive(Clone)]
pub struct LifecycleController {
    shared: Arc<Shared>,
}

impl LifecycleController {
    pub fn new(deps: ControllerDeps) -> Self {
        Self {
            shared: Arc::new(Shared {
                deps,
                state: Mutex::new(ControllerState::default()),
            }),
        }
    }

    fn from_weak(weak: &Weak<Shared>) -> Option<Self> {
        weak.upgrade().map(|shared| Self { shared })
    }

    fn deps(&self) -> &ControllerDeps {
        &self.shared.deps
    }

    // ============================================================================
    // Transitions
    // ============================================================================

    /// Opens a session for `user_id` and returns its id.
    ///
    /// Re-initializing for the same user returns the open session. A
    /// different user's open session is finalized with `logout` first.
    ///
    /// # Errors
    ///
    /// - `InvalidState` for an empty user id
    /// - the store error if the new session record cannot be persisted; no
    ///   session is opened in that case
    pub async fn init(&self, user_id: &str) -> Result<String> {
        if user_id.trim().is_empty() {
            return Err(DwellError::InvalidState("user id must not be empty".into()));
        }

        let mut state = self.shared.state.lock().await;

        if let Some(open) = &state.session {
            if open.user_id == user_id {
                return Ok(open.session_id.clone());
            }
            tracing::info!(
                "[Lifecycle] Switching user; closing session {} first",
                open.session_id
            );
            self.finalize_locked(&mut state, CloseReason::Logout).await;
        }

        let now = self.deps().clock.now();
        let session = SessionState::begin(user_id, now, self.deps().device.clone());
        self.persist(&session).await?;

        let session_id = session.session_id.clone();
        tracing::info!("[Lifecycle] Session {} started for {}", session_id, user_id);

        state.session = Some(session);
        state.subscription = Some(self.spawn_listener());
        state.heartbeat = Some(self.spawn_heartbeat());

        self.deps()
            .dispatcher
            .submit(QueueItem::partial(&session_id, 0));

        Ok(session_id)
    }

    /// Finalizes the open session with `logout`.
    ///
    /// Returns the archived entry, or `None` when no session was open.
    pub async fn stop(&self) -> Option<HistoryEntry> {
        let mut state = self.shared.state.lock().await;
        self.finalize_locked(&mut state, CloseReason::Logout).await
    }

    /// Applies one app lifecycle signal. `inactive` counts as leaving the
    /// foreground.
    pub async fn handle_event(&self, event: AppLifecycleEvent) {
        if event.is_active() {
            self.enter_foreground().await;
        } else {
            self.enter_background().await;
        }
    }

    async fn enter_background(&self) {
        let mut state = self.shared.state.lock().await;
        let now = self.deps().clock.now();

        let Some(session) = state.session.as_mut() else {
            return;
        };
        if !session.pause(now) {
            return;
        }
        let snapshot = session.clone();

        state.cancel_heartbeat();
        state.cancel_grace();

        self.persist_or_warn(&snapshot).await;
        tracing::debug!(
            "[Lifecycle] Session {} backgrounded at {} ms",
            snapshot.session_id,
            snapshot.active_ms
        );
        self.deps()
            .dispatcher
            .submit(QueueItem::partial(&snapshot.session_id, snapshot.active_ms));

        state.grace = Some(self.spawn_grace());
    }

    async fn enter_foreground(&self) {
        let mut state = self.shared.state.lock().await;
        let now = self.deps().clock.now();

        let Some(session) = state.session.as_mut() else {
            return;
        };
        if !session.resume(now) {
            return;
        }
        session.last_heartbeat_at = now;
        let snapshot = session.clone();

        state.cancel_grace();
        state.cancel_heartbeat();

        self.persist_or_warn(&snapshot).await;
        tracing::debug!("[Lifecycle] Session {} foregrounded", snapshot.session_id);
        self.deps()
            .dispatcher
            .submit(QueueItem::heartbeat(&snapshot.session_id));

        state.heartbeat = Some(self.spawn_heartbeat());
    }

    async fn heartbeat_tick(&self, timer_id: u64) {
        let mut state = self.shared.state.lock().await;
        if state.heartbeat.as_ref().map(TimerHandle::id) != Some(timer_id) {
            return;
        }
        let now = self.deps().clock.now();

        let Some(session) = state.session.as_mut() else {
            return;
        };
        if session.phase() != SessionPhase::Foreground {
            return;
        }
        session.last_heartbeat_at = now;
        let snapshot = session.clone();

        self.persist_or_warn(&snapshot).await;
        self.deps()
            .dispatcher
            .submit(QueueItem::heartbeat(&snapshot.session_id));
    }

    async fn grace_elapsed(&self, timer_id: u64) {
        let mut state = self.shared.state.lock().await;
        if state.grace.as_ref().map(TimerHandle::id) != Some(timer_id) {
            return;
        }
        if state.phase() != SessionPhase::Background {
            return;
        }

        // This task is the grace timer; release its handle instead of
        // aborting it mid-finalize.
        if let Some(handle) = state.grace.take() {
            handle.detach();
        }
        self.finalize_locked(&mut state, CloseReason::Close).await;
    }

    /// Closes the open session: folds any open span, cancels every timer and
    /// the subscription, persists the paused record (recovery finishes it if
    /// the close never lands), submits the close, and archives the entry.
    async fn finalize_locked(
        &self,
        state: &mut ControllerState,
        reason: CloseReason,
    ) -> Option<HistoryEntry> {
        let mut session = state.session.take()?;
        let now = self.deps().clock.now();
        session.pause(now);
        let ended_at = session.pause_at.unwrap_or(now);

        state.cancel_heartbeat();
        state.cancel_grace();
        state.cancel_subscription();

        self.persist_or_warn(&session).await;
        self.deps().dispatcher.submit(QueueItem::close(
            &session.session_id,
            session.active_ms,
            reason,
        ));

        let entry = HistoryEntry::finalize(&session, ended_at, session.active_ms, reason);
        if let Err(err) = self.deps().history.append(entry.clone()).await {
            tracing::warn!(
                "[Lifecycle] Failed to archive session {}: {}",
                session.session_id,
                err
            );
        }

        tracing::info!(
            "[Lifecycle] Session {} finalized ({}, {} ms active)",
            session.session_id,
            reason,
            session.active_ms
        );
        Some(entry)
    }

    // ============================================================================
    // Tasks
    // ============================================================================

    fn spawn_listener(&self) -> TimerHandle {
        // Subscribe before spawning so no event emitted after `init` returns
        // is missed.
        let mut events = self.deps().lifecycle.subscribe();
        let weak = Arc::downgrade(&self.shared);

        TimerHandle::spawn(move |_| async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let Some(controller) = Self::from_weak(&weak) else {
                            break;
                        };
                        controller.handle_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("[Lifecycle] Missed {} lifecycle event(s)", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn spawn_heartbeat(&self) -> TimerHandle {
        let period = self.deps().config.heartbeat_interval();
        // Anchored at the transition, not at the task's first poll.
        let start = Instant::now() + period;
        let weak = Arc::downgrade(&self.shared);

        TimerHandle::spawn(move |id| async move {
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(controller) = Self::from_weak(&weak) else {
                    break;
                };
                controller.heartbeat_tick(id).await;
            }
        })
    }

    fn spawn_grace(&self) -> TimerHandle {
        let deadline = Instant::now() + self.deps().config.grace_period();
        let weak = Arc::downgrade(&self.shared);

        TimerHandle::spawn(move |id| async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(controller) = Self::from_weak(&weak) {
                controller.grace_elapsed(id).await;
            }
        })
    }

    // ============================================================================
    // Persistence
    // ============================================================================

    async fn persist(&self, session: &SessionState) -> Result<()> {
        self.deps()
            .store
            .save_json(&self.deps().config.storage.session_key, session)
            .await
    }

    async fn persist_or_warn(&self, session: &SessionState) {
        if let Err(err) = self.persist(session).await {
            tracing::warn!(
                "[Lifecycle] Failed to persist session {}: {}",
                session.session_id,
                err
            );
        }
    }

    // ============================================================================
    // Queries
    // ============================================================================

    pub async fn phase(&self) -> SessionPhase {
        self.shared.state.lock().await.phase()
    }

    /// Copy of the open session record.
    pub async fn snapshot(&self) -> Option<SessionState> {
        self.shared.state.lock().await.session.clone()
    }

    pub async fn session_id(&self) -> Option<String> {
        self.shared
            .state
            .lock()
            .await
            .session
            .as_ref()
            .map(|session| session.session_id.clone())
    }

    pub fn outcomes(&self) -> broadcast::Receiver<ReportOutcome> {
        self.deps().dispatcher.subscribe()
    }

    /// Waits until every report submitted so far has been handled.
    pub async fn flush(&self) {
        self.deps().dispatcher.flush().await;
    }
}
