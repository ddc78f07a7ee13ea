//! Tracker configuration.
//!
//! Every field has a default so an empty or partial `config.toml` is valid.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default interval between heartbeats while foregrounded.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
/// Default background span after which a session counts as closed.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 10_000;
/// Default upper bound for a single collector call.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
/// Default number of finalized sessions kept in the history archive.
pub const MAX_HISTORY: usize = 200;

/// What startup recovery does with a session that died while foregrounded.
///
/// A foregrounded session has no recorded end time, so any close it produces
/// is an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForegroundRecoveryPolicy {
    /// Remove the stale record without reporting it.
    #[default]
    Discard,
    /// Close it, crediting foreground time up to the last heartbeat.
    CloseAtLastHeartbeat,
}

/// Remote collector endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_token: None,
        }
    }
}

/// Keys under which records live in the persistent store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
    pub session_key: String,
    pub queue_key: String,
    pub history_key: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            session_key: "dwell.session_state".to_string(),
            queue_key: "dwell.offline_queue".to_string(),
            history_key: "dwell.session_history".to_string(),
        }
    }
}

/// Root configuration for the usage tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub heartbeat_interval_ms: u64,
    pub grace_period_ms: u64,
    pub request_timeout_ms: u64,
    pub max_history: usize,
    /// Replay the offline queue whenever connectivity comes back.
    pub replay_on_reconnect: bool,
    pub foreground_recovery: ForegroundRecoveryPolicy,
    pub collector: CollectorConfig,
    pub storage: StorageKeys,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_history: MAX_HISTORY,
            replay_on_reconnect: true,
            foreground_recovery: ForegroundRecoveryPolicy::default(),
            collector: CollectorConfig::default(),
            storage: StorageKeys::default(),
        }
    }
}

impl TrackerConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Rejects values the controller cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.heartbeat_interval_ms == 0 {
            return Err(crate::error::DwellError::config(
                "heartbeat_interval_ms must be greater than zero",
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(crate::error::DwellError::config(
                "request_timeout_ms must be greater than zero",
            ));
        }
        if self.max_history == 0 {
            return Err(crate::error::DwellError::config(
                "max_history must be greater than zero",
            ));
        }
        Ok(())
    }
}
