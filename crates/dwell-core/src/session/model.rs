//! Session domain model.
//!
//! `SessionState` is the single open usage session. It is owned by the
//! lifecycle controller and persisted after every mutation so that startup
//! recovery can finish it if the process dies.

use crate::clock::elapsed_ms;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Build/device details attached to sessions and history entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
}

/// Where the controller currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    NoSession,
    Foreground,
    Background,
}

/// The single open session.
///
/// `foreground_since` and `pause_at` are never both set. While the session is
/// open exactly one of them is set, except transiently during creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Unique session identifier (UUID v4)
    pub session_id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    /// Accumulated foreground time of closed spans.
    pub active_ms: u64,
    /// Start of the current foreground span.
    #[serde(default)]
    pub foreground_since: Option<DateTime<Utc>>,
    /// Instant the session last entered background.
    #[serde(default)]
    pub pause_at: Option<DateTime<Utc>>,
    pub last_heartbeat_at: DateTime<Utc>,
    #[serde(flatten)]
    pub device: DeviceMetadata,
}

impl SessionState {
    /// Starts a fresh foregrounded session.
    pub fn begin(user_id: impl Into<String>, now: DateTime<Utc>, device: DeviceMetadata) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            started_at: now,
            active_ms: 0,
            foreground_since: Some(now),
            pause_at: None,
            last_heartbeat_at: now,
            device,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.foreground_since.is_some() {
            SessionPhase::Foreground
        } else {
            SessionPhase::Background
        }
    }

    /// Folds the open foreground span into `active_ms` and marks the session
    /// as paused at `now`. Returns `false` if it was not foregrounded.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        let Some(since) = self.foreground_since.take() else {
            return false;
        };
        self.active_ms += elapsed_ms(since, now);
        self.pause_at = Some(now);
        true
    }

    /// Opens a new foreground span at `now`. Returns `false` if it was
    /// already foregrounded.
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        if self.foreground_since.is_some() {
            return false;
        }
        self.foreground_since = Some(now);
        self.pause_at = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_700_000_000_000 + ms).unwrap()
    }

    #[test]
    fn test_begin_is_foregrounded() {
        let state = SessionState::begin("user-1", at(0), DeviceMetadata::default());
        assert_eq!(state.phase(), SessionPhase::Foreground);
        assert_eq!(state.active_ms, 0);
        assert!(state.pause_at.is_none());
        assert!(!state.session_id.is_empty());
    }

    #[test]
    fn test_pause_and_resume_accumulate_spans() {
        let mut state = SessionState::begin("user-1", at(0), DeviceMetadata::default());

        assert!(state.pause(at(5_000)));
        assert_eq!(state.active_ms, 5_000);
        assert_eq!(state.pause_at, Some(at(5_000)));
        assert_eq!(state.phase(), SessionPhase::Background);
        assert!(!state.pause(at(6_000)));

        assert!(state.resume(at(8_000)));
        assert!(state.pause_at.is_none());
        assert!(!state.resume(at(9_000)));

        assert!(state.pause(at(20_000)));
        assert_eq!(state.active_ms, 17_000);
        assert!(state.foreground_since.is_none());
    }

    #[test]
    fn test_unique_session_ids() {
        let a = SessionState::begin("u", at(0), DeviceMetadata::default());
        let b = SessionState::begin("u", at(0), DeviceMetadata::default());
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn test_device_metadata_is_flattened() {
        let device = DeviceMetadata {
            app_version: Some("2.4.1".to_string()),
            device_model: Some("Pixel 8".to_string()),
        };
        let state = SessionState::begin("u", at(0), device.clone());
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["app_version"], "2.4.1");

        let restored: SessionState = serde_json::from_value(json).unwrap();
        assert_eq!(restored.device, device);
    }
}
