//! Serializer configuration loader.
//!
//! Reads `spindle.toml` and deserializes it into [`SerializerConfig`]. Falls
//! back to defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use spindle_types::config::SerializerConfig;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "spindle.toml";

/// Load serializer configuration from `path`.
///
/// - If the file does not exist, returns [`SerializerConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config.
pub fn load_config(path: &Path) -> SerializerConfig {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return SerializerConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return SerializerConfig::default();
        }
    };

    match toml::from_str::<SerializerConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            SerializerConfig::default()
        }
    }
}

/// Resolve the config file path.
///
/// Priority:
/// 1. An explicit path (the CLI `--config` flag)
/// 2. `SPINDLE_CONFIG` environment variable
/// 3. `spindle.toml` in the working directory
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("SPINDLE_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from(CONFIG_FILE)
}
