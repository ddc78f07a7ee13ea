//! Collector double shared by the unit tests in this crate.

use async_trait::async_trait;
use dwell_core::error::{DwellError, Result};
use dwell_core::report::{CloseReason, QueueItem, UsageCollector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const NO_LIMIT: usize = usize::MAX;

/// Records accepted reports; can be told to start failing.
#[derive(Clone)]
pub struct RecordingCollector {
    accepted: Arc<Mutex<Vec<QueueItem>>>,
    attempts: Arc<AtomicUsize>,
    succeed_limit: Arc<AtomicUsize>,
}

impl RecordingCollector {
    pub fn new() -> Self {
        Self {
            accepted: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            succeed_limit: Arc::new(AtomicUsize::new(NO_LIMIT)),
        }
    }

    /// Accept the next `n` attempts, reject everything after.
    pub fn fail_after(&self, n: usize) {
        let already = self.attempts.load(Ordering::SeqCst);
        self.succeed_limit.store(already + n, Ordering::SeqCst);
    }

    pub fn fail_all(&self) {
        self.fail_after(0);
    }

    pub fn calls(&self) -> Vec<QueueItem> {
        self.accepted.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn record(&self, item: QueueItem) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.succeed_limit.load(Ordering::SeqCst) {
            return Err(DwellError::delivery("collector returned 503"));
        }
        self.accepted.lock().unwrap().push(item);
        Ok(())
    }
}

#[async_trait]
impl UsageCollector for RecordingCollector {
    async fn heartbeat(&self, session_id: &str) -> Result<()> {
        self.record(QueueItem::heartbeat(session_id))
    }

    async fn partial(&self, session_id: &str, active_ms: u64) -> Result<()> {
        self.record(QueueItem::partial(session_id, active_ms))
    }

    async fn close(&self, session_id: &str, active_ms: u64, reason: CloseReason) -> Result<()> {
        self.record(QueueItem::close(session_id, active_ms, reason))
    }
}
