//! Composition root.
//!
//! `UsageTracker` wires the store, collector, connectivity oracle, lifecycle
//! source and clock into the queue, history archive, dispatcher and
//! controller, and runs startup recovery before any session can open.

use crate::controller::{ControllerDeps, LifecycleController};
use crate::dispatcher::ReportDispatcher;
use crate::history::HistoryArchive;
use crate::queue::OfflineQueue;
use crate::recovery::{RecoveryOutcome, StaleSessionRecovery};
use crate::reporter::Reporter;
use anyhow::Context;
use dwell_core::clock::{Clock, MonotonicClock};
use dwell_core::config::TrackerConfig;
use dwell_core::error::Result;
use dwell_core::history::HistoryEntry;
use dwell_core::report::{ConnectivityOracle, UsageCollector};
use dwell_core::session::{AppLifecycleSource, DeviceMetadata};
use dwell_core::store::KeyValueStore;
use dwell_infrastructure::config_service::load_tracker_config;
use dwell_infrastructure::paths::DwellPaths;
use dwell_infrastructure::{HttpCollector, JsonFileStore};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// External collaborators supplied by the host.
pub struct Collaborators {
    pub store: Arc<dyn KeyValueStore>,
    pub collector: Arc<dyn UsageCollector>,
    pub connectivity: Arc<dyn ConnectivityOracle>,
    pub lifecycle: Arc<dyn AppLifecycleSource>,
    pub clock: Arc<dyn Clock>,
    pub device: DeviceMetadata,
}

pub struct UsageTracker {
    controller: LifecycleController,
    history: Arc<HistoryArchive>,
    queue: Arc<OfflineQueue>,
    recovery: RecoveryOutcome,
    shutdown: CancellationToken,
    reconnect_watcher: Option<JoinHandle<()>>,
}

impl UsageTracker {
    /// Builds the tracker and runs the startup sequence: recovery of a
    /// stale session, then a replay of the offline queue.
    pub async fn start(config: TrackerConfig, collab: Collaborators) -> Result<Self> {
        config.validate()?;

        let queue = Arc::new(OfflineQueue::new(
            collab.store.clone(),
            &config.storage.queue_key,
        ));
        let history = Arc::new(HistoryArchive::new(
            collab.store.clone(),
            &config.storage.history_key,
            config.max_history,
        ));
        let reporter = Arc::new(Reporter::new(
            collab.collector.clone(),
            collab.connectivity.clone(),
            queue.clone(),
            config.request_timeout(),
        ));

        let recovery = StaleSessionRecovery::new(
            collab.store.clone(),
            &config.storage.session_key,
            reporter.clone(),
            history.clone(),
            config.foreground_recovery,
        )
        .run()
        .await;
        tracing::info!("[UsageTracker] Startup recovery: {:?}", recovery);

        if let Some(summary) = reporter.replay_queue().await {
            tracing::info!(
                "[UsageTracker] Startup replay: {} delivered, {} requeued",
                summary.delivered,
                summary.requeued
            );
        }

        let dispatcher = ReportDispatcher::spawn(
            reporter,
            collab.store.clone(),
            &config.storage.session_key,
        );

        let shutdown = CancellationToken::new();
        let reconnect_watcher = if config.replay_on_reconnect {
            spawn_reconnect_watcher(
                collab.connectivity.as_ref(),
                dispatcher.clone(),
                shutdown.clone(),
            )
        } else {
            None
        };

        let controller = LifecycleController::new(ControllerDeps {
            config,
            store: collab.store,
            lifecycle: collab.lifecycle,
            clock: collab.clock,
            history: history.clone(),
            dispatcher,
            device: collab.device,
        });

        Ok(Self {
            controller,
            history,
            queue,
            recovery,
            shutdown,
            reconnect_watcher,
        })
    }

    /// Starts with the file store under the platform data directory and the
    /// HTTP collector from `config.collector`.
    pub async fn start_default(
        config: TrackerConfig,
        connectivity: Arc<dyn ConnectivityOracle>,
        lifecycle: Arc<dyn AppLifecycleSource>,
        device: DeviceMetadata,
    ) -> anyhow::Result<Self> {
        let store_dir = DwellPaths::store_dir().context("Failed to resolve store directory")?;
        let collector = HttpCollector::new(&config.collector, config.request_timeout());

        let collab = Collaborators {
            store: Arc::new(JsonFileStore::new(store_dir)),
            collector: Arc::new(collector),
            connectivity,
            lifecycle,
            clock: Arc::new(MonotonicClock::new()),
            device,
        };

        Self::start(config, collab)
            .await
            .context("Failed to start usage tracker")
    }

    /// Loads `~/.config/dwell/config.toml` (defaults when absent) and
    /// starts with [`UsageTracker::start_default`].
    pub async fn start_from_config_file(
        connectivity: Arc<dyn ConnectivityOracle>,
        lifecycle: Arc<dyn AppLifecycleSource>,
        device: DeviceMetadata,
    ) -> anyhow::Result<Self> {
        let config = load_tracker_config(None).context("Failed to load tracker config")?;
        Self::start_default(config, connectivity, lifecycle, device).await
    }

    pub async fn login(&self, user_id: &str) -> Result<String> {
        self.controller.init(user_id).await
    }

    pub async fn logout(&self) -> Option<HistoryEntry> {
        self.controller.stop().await
    }

    pub fn controller(&self) -> &LifecycleController {
        &self.controller
    }

    pub fn history(&self) -> &Arc<HistoryArchive> {
        &self.history
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.queue
    }

    /// What startup recovery did.
    pub fn recovery(&self) -> &RecoveryOutcome {
        &self.recovery
    }

    /// Stops the reconnect watcher and waits for pending reports. The open
    /// session, if any, stays persisted for the next start to recover.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(watcher) = self.reconnect_watcher.take() {
            let _ = watcher.await;
        }
        self.controller.flush().await;
        tracing::info!("[UsageTracker] Shut down");
    }
}

impl Drop for UsageTracker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Replays the queue on every offline -> online edge.
fn spawn_reconnect_watcher(
    connectivity: &dyn ConnectivityOracle,
    dispatcher: ReportDispatcher,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    let mut reachable = connectivity.watch()?;

    Some(tokio::spawn(async move {
        let mut was_reachable = *reachable.borrow_and_update();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = reachable.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_reachable = *reachable.borrow_and_update();
                    if now_reachable && !was_reachable {
                        tracing::info!("[UsageTracker] Connectivity restored; replaying queue");
                        dispatcher.replay();
                    }
                    was_reachable = now_reachable;
                }
            }
        }
    }))
}
