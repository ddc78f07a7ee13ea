//! Cancellable background task handles.
//!
//! The controller keeps one `TimerHandle` per running timer (heartbeat,
//! grace) and one for the lifecycle subscription. Each handle carries an id
//! so a timer that fires after being superseded can recognise itself as
//! stale and do nothing.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

/// Owned handle to a spawned task; dropping it aborts the task.
#[derive(Debug)]
pub struct TimerHandle {
    id: u64,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    /// Spawns `make(id)` on the current runtime.
    pub fn spawn<F, Fut>(make: F) -> Self
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(make(id));
        Self {
            id,
            task: Some(task),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Aborts the task. It stops at its next await point.
    pub fn cancel(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Releases the handle without aborting.
    ///
    /// Used by a timer task that is finalizing the session from inside
    /// itself; aborting there would cut its own work short.
    pub fn detach(mut self) {
        self.task.take();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
