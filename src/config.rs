//! Configuration for riskwatch.
//!
//! Settings live in `riskwatch.toml` inside the data directory. A missing
//! file means defaults; every field is optional.
//!
//! # Example riskwatch.toml
//!
//! ```toml
//! storage_key = "prediction-storage"
//! trend_window = 10
//! history_limit = 50
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Result, RiskwatchError};
use crate::history::{FileSnapshotStorage, DEFAULT_STORAGE_KEY, DEFAULT_TREND_WINDOW};

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE: &str = "riskwatch.toml";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "RISKWATCH_DATA_DIR";

/// Directory name used under the platform data directory.
const APP_DIR: &str = "riskwatch";

/// Fallback data directory when the platform has none.
const FALLBACK_DIR: &str = ".riskwatch";

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

fn default_trend_window() -> usize {
    DEFAULT_TREND_WINDOW
}

/// riskwatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Storage key naming the history snapshot (default: "prediction-storage").
    #[serde(default = "default_storage_key")]
    pub storage_key: String,

    /// Number of recent predictions shown in a trend (default: 10).
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,

    /// Maximum number of records listed by `history` (default: all).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            trend_window: default_trend_window(),
            history_limit: None,
        }
    }
}

impl Config {
    /// Load configuration from the data directory, or defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or
    /// validated.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::config_path(data_dir);

        if !path.exists() {
            debug!("No config at {}; using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            RiskwatchError::config_with_path(format!("Failed to parse: {e}"), path.clone())
        })?;
        config.validate().map_err(|e| match e {
            RiskwatchError::Config { message, .. } => {
                RiskwatchError::config_with_path(message, path.clone())
            }
            other => other,
        })?;
        Ok(config)
    }

    /// Check field values.
    ///
    /// # Errors
    ///
    /// Returns [`RiskwatchError::Config`] for an empty or path-like storage
    /// key, or a zero trend window.
    pub fn validate(&self) -> Result<()> {
        let key = self.storage_key.trim();
        if key.is_empty() {
            return Err(RiskwatchError::config("storage_key must not be empty"));
        }
        if key.contains(['/', '\\']) || key == "." || key == ".." {
            return Err(RiskwatchError::config(format!(
                "storage_key '{}' must be a plain name, not a path",
                self.storage_key
            )));
        }
        if self.trend_window == 0 {
            return Err(RiskwatchError::config("trend_window must be at least 1"));
        }
        Ok(())
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RiskwatchError::config(e.to_string()))
    }

    /// Snapshot storage described by this configuration.
    #[must_use]
    pub fn storage(&self, data_dir: &Path) -> FileSnapshotStorage {
        FileSnapshotStorage::with_key(data_dir, self.storage_key.trim())
    }

    /// Get the config file path for a data directory
    pub fn config_path(data_dir: &Path) -> PathBuf {
        data_dir.join(CONFIG_FILE)
    }

    /// Default data directory: the platform data directory, else `./.riskwatch`.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|dir| dir.join(APP_DIR))
            .unwrap_or_else(|| PathBuf::from(FALLBACK_DIR))
    }
}
