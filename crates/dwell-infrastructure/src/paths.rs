//! Platform path resolution for dwell files.
//!
//! # Directory Structure
//!
//! ```text
//! ~/.config/dwell/             # Config directory
//! └── config.toml              # Tracker configuration
//!
//! ~/.local/share/dwell/        # Data directory
//! └── store/                   # JsonFileStore root
//!     ├── dwell.session_state.json
//!     ├── dwell.offline_queue.json
//!     └── dwell.session_history.json
//! ```

use std::path::PathBuf;

const APP_DIR: &str = "dwell";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// Home/config/data directory could not be determined.
    HomeDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::HomeDirNotFound => write!(f, "Cannot find home directory"),
        }
    }
}

impl std::error::Error for PathError {}

impl From<PathError> for dwell_core::DwellError {
    fn from(err: PathError) -> Self {
        dwell_core::DwellError::config(err.to_string())
    }
}

pub struct DwellPaths;

impl DwellPaths {
    /// e.g. `~/.config/dwell/`
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    /// e.g. `~/.local/share/dwell/`
    pub fn data_dir() -> Result<PathBuf, PathError> {
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::HomeDirNotFound)
    }

    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Root directory for [`crate::storage::JsonFileStore`].
    pub fn store_dir() -> Result<PathBuf, PathError> {
        Ok(Self::data_dir()?.join("store"))
    }
}
