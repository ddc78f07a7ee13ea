//! Error types for the dwell usage tracker.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the whole tracker.
///
/// Variants are structured so callers can tell storage trouble apart from
/// delivery trouble without string matching. None of these ever reach the
/// end user; the tracker logs them and carries on.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DwellError {
    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Persistent store read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// The collector was reachable but the report call failed
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// A report call did not finish within the configured timeout
    #[error("Delivery timed out after {0} ms")]
    Timeout(u64),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation not valid for the current session phase
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DwellError {
    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a Delivery error
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Check if this error came from talking to the collector.
    pub fn is_delivery(&self) -> bool {
        matches!(self, Self::Delivery(_) | Self::Timeout(_))
    }
}

impl From<std::io::Error> for DwellError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for DwellError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for DwellError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for DwellError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, DwellError>`.
pub type Result<T> = std::result::Result<T, DwellError>;
