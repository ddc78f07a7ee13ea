use crate::paths::DwellPaths;
use dwell_core::config::TrackerConfig;
use dwell_core::error::{DwellError, Result};
use std::fs;
use std::path::Path;

/// Loads the tracker configuration.
///
/// Reads `path` if given, otherwise `~/.config/dwell/config.toml`.
///
/// # Returns
///
/// - `Ok(TrackerConfig)`: parsed config, or defaults when the file is
///   missing, empty, or the config directory cannot be resolved
/// - `Err(DwellError::Config)`: the file exists but cannot be read, parsed,
///   or fails validation
pub fn load_tracker_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let config_path = match path {
        Some(path) => path.to_path_buf(),
        None => match DwellPaths::config_file() {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!("[Config] {}; using defaults", err);
                return Ok(TrackerConfig::default());
            }
        },
    };

    if !config_path.exists() {
        tracing::debug!("[Config] No config at {:?}; using defaults", config_path);
        return Ok(TrackerConfig::default());
    }

    let content = fs::read_to_string(&config_path).map_err(|e| {
        DwellError::config(format!(
            "Failed to read config file at {:?}: {}",
            config_path, e
        ))
    })?;

    if content.trim().is_empty() {
        return Ok(TrackerConfig::default());
    }

    let config: TrackerConfig = toml::from_str(&content).map_err(|e| {
        DwellError::config(format!(
            "Failed to parse TOML from {:?}: {}",
            config_path, e
        ))
    })?;
    config.validate()?;

    tracing::info!("[Config] Loaded tracker config from {:?}", config_path);
    Ok(config)
}

/// Writes `config` as pretty TOML, creating parent directories.
pub fn save_tracker_config(config: &TrackerConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let toml_string = toml::to_string_pretty(config)?;
    fs::write(path, toml_string)?;
    Ok(())
}
