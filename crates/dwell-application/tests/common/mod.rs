#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dwell_application::{Collaborators, UsageTracker};
use dwell_core::clock::MonotonicClock;
use dwell_core::config::TrackerConfig;
use dwell_core::error::{DwellError, Result};
use dwell_core::report::{CloseReason, QueueItem, UsageCollector};
use dwell_core::session::DeviceMetadata;
use dwell_core::store::KeyValueStore;
use dwell_infrastructure::{BroadcastLifecycleSource, InMemoryStore, ManualConnectivity};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Collector that records what it accepted.
#[derive(Clone, Default)]
pub struct FakeCollector {
    accepted: Arc<Mutex<Vec<QueueItem>>>,
    failing: Arc<AtomicBool>,
}

impl FakeCollector {
    pub fn calls(&self) -> Vec<QueueItem> {
        self.accepted.lock().unwrap().clone()
    }

    pub fn closes(&self) -> Vec<QueueItem> {
        self.calls().into_iter().filter(QueueItem::is_close).collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn accept(&self, item: QueueItem) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(DwellError::delivery("collector unavailable"));
        }
        self.accepted.lock().unwrap().push(item);
        Ok(())
    }
}

#[async_trait]
impl UsageCollector for FakeCollector {
    async fn heartbeat(&self, session_id: &str) -> Result<()> {
        self.accept(QueueItem::heartbeat(session_id))
    }

    async fn partial(&self, session_id: &str, active_ms: u64) -> Result<()> {
        self.accept(QueueItem::partial(session_id, active_ms))
    }

    async fn close(&self, session_id: &str, active_ms: u64, reason: CloseReason) -> Result<()> {
        self.accept(QueueItem::close(session_id, active_ms, reason))
    }
}

pub fn anchor() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
}

/// A tracker over in-memory collaborators, plus handles to drive them.
pub struct Harness {
    pub store: InMemoryStore,
    pub collector: FakeCollector,
    pub connectivity: ManualConnectivity,
    pub lifecycle: BroadcastLifecycleSource,
    pub tracker: UsageTracker,
}

impl Harness {
    pub async fn start(online: bool) -> Self {
        Self::start_with(InMemoryStore::new(), online, TrackerConfig::default()).await
    }

    pub async fn start_with(store: InMemoryStore, online: bool, config: TrackerConfig) -> Self {
        let collector = FakeCollector::default();
        let connectivity = ManualConnectivity::new(online);
        let lifecycle = BroadcastLifecycleSource::new();

        let collab = Collaborators {
            store: Arc::new(store.clone()) as Arc<dyn KeyValueStore>,
            collector: Arc::new(collector.clone()),
            connectivity: Arc::new(connectivity.clone()),
            lifecycle: Arc::new(lifecycle.clone()),
            clock: Arc::new(MonotonicClock::anchored_at(anchor())),
            device: DeviceMetadata {
                app_version: Some("1.4.0".into()),
                device_model: Some("test-device".into()),
            },
        };
        let tracker = UsageTracker::start(config, collab)
            .await
            .expect("tracker should start");

        Self {
            store,
            collector,
            connectivity,
            lifecycle,
            tracker,
        }
    }

    /// Lets spawned listener and timer tasks catch up, then drains the
    /// dispatcher.
    pub async fn settle(&self) {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
        self.tracker.controller().flush().await;
    }

    pub async fn advance(&self, ms: u64) {
        tokio::time::advance(Duration::from_millis(ms)).await;
        self.settle().await;
    }
}
