//! Time source used for span accounting.

use chrono::{DateTime, Utc};

/// Supplies the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall time anchored once, then advanced by tokio's monotonic clock.
///
/// Foreground spans are measured as differences between two `now()` calls,
/// so a wall-clock adjustment mid-session cannot produce negative or inflated
/// spans. Under `tokio::time::pause` it follows the paused test clock.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    anchor_wall: DateTime<Utc>,
    anchor: tokio::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    /// Anchors the clock at a fixed wall time. Handy for deterministic tests.
    pub fn anchored_at(anchor_wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now().saturating_duration_since(self.anchor);
        let elapsed = chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero());
        self.anchor_wall + elapsed
    }
}

/// Milliseconds from `since` to `until`, clamped at zero.
pub fn elapsed_ms(since: DateTime<Utc>, until: DateTime<Utc>) -> u64 {
    (until - since).num_milliseconds().max(0) as u64
}
