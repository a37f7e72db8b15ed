use crate::core::rule::DEFAULT_DESCRIPTION;
use crate::utils::get_config_dir;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Application configuration
///
/// Read from `config.json` in the per-user config directory. Every field is
/// optional; the rule name prefix is deliberately absent because it is the
/// only record of which rules this program owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// File name suffix of executables collected from listed directories
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Description attached to created rules
    #[serde(default = "default_description")]
    pub description: String,
    /// Append one event per run to the audit log
    #[serde(default = "default_true")]
    pub audit_log: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            description: default_description(),
            audit_log: true,
        }
    }
}

fn default_extension() -> String {
    ".exe".to_string()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

fn default_true() -> bool {
    true
}

/// Loads the app config from disk, or returns default if not found.
pub fn load_config() -> AppConfig {
    match get_config_dir() {
        Some(dir) => load_config_from(&dir.join("config.json")),
        None => AppConfig::default(),
    }
}

/// Loads the config at `path`
///
/// A missing file yields the defaults silently; an unreadable or invalid one
/// yields the defaults with a warning.
pub fn load_config_from(path: &Path) -> AppConfig {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AppConfig::default(),
        Err(e) => {
            warn!("Failed to read config {:?}: {e}", path);
            return AppConfig::default();
        }
    };

    match serde_json::from_str::<AppConfig>(&json) {
        Ok(config) if config.extension.is_empty() => {
            warn!("Config {:?} has an empty extension, using defaults", path);
            AppConfig::default()
        }
        Ok(config) => config,
        Err(e) => {
            warn!("Ignoring invalid config {:?}: {e}", path);
            AppConfig::default()
        }
    }
}
