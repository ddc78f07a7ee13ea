//! Remote collector interface.

use super::model::{CloseReason, QueueItem};
use crate::error::Result;
use async_trait::async_trait;

/// The three report operations the remote collector accepts.
///
/// Implementations perform exactly one attempt per call. Retry, queueing and
/// timeouts are handled by the caller.
#[async_trait]
pub trait UsageCollector: Send + Sync {
    /// Lightweight "still active" signal.
    async fn heartbeat(&self, session_id: &str) -> Result<()>;

    /// Checkpoint of accumulated active time.
    async fn partial(&self, session_id: &str, active_ms: u64) -> Result<()>;

    /// Final report for a session.
    async fn close(&self, session_id: &str, active_ms: u64, reason: CloseReason) -> Result<()>;
}

/// Routes a queued item to the matching collector operation.
pub async fn send_item(collector: &dyn UsageCollector, item: &QueueItem) -> Result<()> {
    match item {
        QueueItem::Heartbeat { session_id } => collector.heartbeat(session_id).await,
        QueueItem::Partial {
            session_id,
            active_ms,
        } => collector.partial(session_id, *active_ms).await,
        QueueItem::Close {
            session_id,
            active_ms,
            reason,
        } => collector.close(session_id, *active_ms, *reason).await,
    }
}
