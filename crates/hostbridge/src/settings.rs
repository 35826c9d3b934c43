use std::path::Path;

use hostbridge_platform::AppPaths;
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const API_BASE_URL_ENV: &str = "HOSTBRIDGE_API_BASE_URL";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSettings {
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// GitHub `owner/name` publishing release payloads.
    #[serde(default)]
    pub update_repo: Option<String>,

    #[serde(default = "default_true")]
    pub auto_download_updates: bool,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_shell_probe_timeout")]
    pub shell_probe_timeout_secs: u64,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,
}

fn default_true() -> bool {
    true
}

fn default_http_timeout() -> u64 {
    30
}

fn default_shell_probe_timeout() -> u64 {
    10
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            update_repo: None,
            auto_download_updates: true,
            http_timeout_secs: default_http_timeout(),
            shell_probe_timeout_secs: default_shell_probe_timeout(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
        }
    }
}

impl BridgeSettings {
    /// Load `settings.json`, falling back to defaults when it is missing or
    /// unreadable, then apply environment overrides.
    #[must_use]
    pub fn load(paths: &AppPaths) -> Self {
        let settings_path = paths.settings_file();
        let settings = if settings_path.exists() {
            Self::load_from(&settings_path).unwrap_or_else(|error| {
                warn!("Ignoring {}: {error}", settings_path.display());
                Self::default()
            })
        } else {
            Self::default()
        };

        settings.with_api_base_url_override(std::env::var(API_BASE_URL_ENV).ok())
    }

    /// # Errors
    /// Returns an error when the file cannot be read or is not valid settings JSON.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    #[must_use]
    pub fn with_api_base_url_override(mut self, value: Option<String>) -> Self {
        if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
            self.api_base_url = Some(value);
        }
        self
    }
}
