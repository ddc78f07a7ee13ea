//! Host-driven signal sources.
//!
//! Platform glue (a reachability listener, the app-state callback) pushes
//! into these; the tracker reads from them through the core traits.

use async_trait::async_trait;
use dwell_core::report::ConnectivityOracle;
use dwell_core::session::{AppLifecycleEvent, AppLifecycleSource};
use tokio::sync::{broadcast, watch};

const LIFECYCLE_CHANNEL_CAPACITY: usize = 64;

/// Connectivity oracle whose answer is set by the host.
#[derive(Clone)]
pub struct ManualConnectivity {
    sender: watch::Sender<bool>,
}

impl ManualConnectivity {
    pub fn new(reachable: bool) -> Self {
        let (sender, _) = watch::channel(reachable);
        Self { sender }
    }

    /// Records a reachability change. Unchanged values do not notify
    /// watchers.
    pub fn set_reachable(&self, reachable: bool) {
        self.sender.send_if_modified(|current| {
            if *current == reachable {
                false
            } else {
                *current = reachable;
                true
            }
        });
    }
}

#[async_trait]
impl ConnectivityOracle for ManualConnectivity {
    async fn is_reachable(&self) -> bool {
        *self.sender.borrow()
    }

    fn watch(&self) -> Option<watch::Receiver<bool>> {
        Some(self.sender.subscribe())
    }
}

/// Fan-out of app lifecycle events to subscribers.
#[derive(Clone)]
pub struct BroadcastLifecycleSource {
    sender: broadcast::Sender<AppLifecycleEvent>,
}

impl BroadcastLifecycleSource {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(LIFECYCLE_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publishes an event. Returns the number of subscribers that saw it.
    pub fn emit(&self, event: AppLifecycleEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastLifecycleSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AppLifecycleSource for BroadcastLifecycleSource {
    fn subscribe(&self) -> broadcast::Receiver<AppLifecycleEvent> {
        self.sender.subscribe()
    }
}
