//! Runtime configuration loaded from `~/.cartsync/config.yaml`.
//!
//! # API pattern
//!
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment override for [`Config::inventory_url`].
pub const INVENTORY_URL_ENV: &str = "CARTSYNC_INVENTORY_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the inventory service API, without trailing slash.
    pub inventory_url: String,
    pub request_timeout_secs: u64,
    pub channel_timeout_secs: u64,
    /// Pause between consecutive detail fetches.
    pub fetch_interval_ms: u64,
    /// Backoff before retrying a request that got a 401.
    pub auth_retry_delay_ms: u64,
    pub default_window_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inventory_url: "http://127.0.0.1:3000/api".to_string(),
            request_timeout_secs: 30,
            channel_timeout_secs: 60,
            fetch_interval_ms: 1000,
            auth_retry_delay_ms: 1000,
            default_window_days: 90,
        }
    }
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn channel_timeout(&self) -> Duration {
        Duration::from_secs(self.channel_timeout_secs)
    }

    pub fn fetch_interval(&self) -> Duration {
        Duration::from_millis(self.fetch_interval_ms)
    }

    pub fn auth_retry_delay(&self) -> Duration {
        Duration::from_millis(self.auth_retry_delay_ms)
    }

    /// Load the config under `home`, falling back to defaults when the file is
    /// absent. [`INVENTORY_URL_ENV`] wins over the file.
    pub fn load_at(home: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_file_at(home)?;
        if let Ok(url) = std::env::var(INVENTORY_URL_ENV) {
            if !url.trim().is_empty() {
                tracing::debug!(env = INVENTORY_URL_ENV, "inventory url overridden from environment");
                config.inventory_url = url;
            }
        }
        config.inventory_url = config.inventory_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_at(&home()?)
    }

    fn load_file_at(home: &Path) -> Result<Self, ConfigError> {
        let path = config_path_at(home);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
    }
}

/// `<home>/.cartsync/`
pub fn cartsync_root(home: &Path) -> PathBuf {
    home.join(".cartsync")
}

/// `<home>/.cartsync/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    cartsync_root(home).join("config.yaml")
}

pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}
