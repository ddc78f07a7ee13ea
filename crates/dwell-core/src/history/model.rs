use crate::report::CloseReason;
use crate::session::{DeviceMetadata, SessionState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable record of a finalized session, kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub session_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub active_ms: u64,
    pub reason: CloseReason,
    #[serde(default)]
    pub device: DeviceMetadata,
}

impl HistoryEntry {
    /// Builds the entry for `state` closing at `ended_at` with `active_ms`
    /// credited.
    pub fn finalize(
        state: &SessionState,
        ended_at: DateTime<Utc>,
        active_ms: u64,
        reason: CloseReason,
    ) -> Self {
        Self {
            session_id: state.session_id.clone(),
            user_id: state.user_id.clone(),
            started_at: state.started_at,
            ended_at,
            active_ms,
            reason,
            device: state.device.clone(),
        }
    }
}
