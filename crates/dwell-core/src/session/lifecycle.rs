use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::broadcast;

/// App visibility transitions reported by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AppLifecycleEvent {
    Foreground,
    /// Transitional state (system dialog, app switcher). Counts as not active.
    Inactive,
    Background,
}

impl AppLifecycleEvent {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Foreground)
    }
}

/// Source of app lifecycle signals.
///
/// The controller subscribes once per open session and drops the receiver
/// when the session is finalized.
pub trait AppLifecycleSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<AppLifecycleEvent>;
}
