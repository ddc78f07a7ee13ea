//! Report payloads and delivery outcomes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CloseReason {
    /// Explicit stop, e.g. the user logged out.
    Logout,
    /// Backgrounded longer than the grace period, or recovered after a kill.
    Close,
}

/// One report destined for the collector.
///
/// Also the element type of the persisted offline queue, so the serialized
/// shape is part of the on-device format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueItem {
    Heartbeat {
        session_id: String,
    },
    Partial {
        session_id: String,
        active_ms: u64,
    },
    Close {
        session_id: String,
        active_ms: u64,
        reason: CloseReason,
    },
}

impl QueueItem {
    pub fn heartbeat(session_id: impl Into<String>) -> Self {
        Self::Heartbeat {
            session_id: session_id.into(),
        }
    }

    pub fn partial(session_id: impl Into<String>, active_ms: u64) -> Self {
        Self::Partial {
            session_id: session_id.into(),
            active_ms,
        }
    }

    pub fn close(session_id: impl Into<String>, active_ms: u64, reason: CloseReason) -> Self {
        Self::Close {
            session_id: session_id.into(),
            active_ms,
            reason,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::Heartbeat { session_id }
            | Self::Partial { session_id, .. }
            | Self::Close { session_id, .. } => session_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Heartbeat { .. } => "heartbeat",
            Self::Partial { .. } => "partial",
            Self::Close { .. } => "close",
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Self::Close { .. })
    }
}

/// What happened to a single report attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// The collector accepted the report.
    Delivered,
    /// The report was appended to the offline queue.
    Queued,
    /// The report was lost (best-effort telemetry).
    Dropped { reason: String },
}

impl DeliveryOutcome {
    pub fn dropped(reason: impl Into<String>) -> Self {
        Self::Dropped {
            reason: reason.into(),
        }
    }

    /// Delivered or durably queued.
    pub fn is_durable(&self) -> bool {
        matches!(self, Self::Delivered | Self::Queued)
    }
}

/// A report paired with its outcome, published after every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOutcome {
    pub item: QueueItem,
    pub outcome: DeliveryOutcome,
}

/// Counts for one replay pass over the offline queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub delivered: usize,
    /// Items left in the queue because delivery failed at or before them.
    pub requeued: usize,
}
