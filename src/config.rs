use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::paths;

pub const REMOTE_URL_ENV: &str = "STRIDE_REMOTE_URL";
pub const REMOTE_KEY_ENV: &str = "STRIDE_REMOTE_KEY";

fn default_table() -> String {
    "trackers".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_local_debounce_ms() -> u64 {
    300
}

fn default_mirror_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            table: default_table(),
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Contents of `<home>/config.json`. Every field is optional on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
    #[serde(default = "default_local_debounce_ms")]
    pub local_debounce_ms: u64,
    #[serde(default = "default_mirror_delay_ms")]
    pub mirror_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: None,
            local_debounce_ms: default_local_debounce_ms(),
            mirror_delay_ms: default_mirror_delay_ms(),
        }
    }
}

impl Config {
    /// Read `config.json` from the data directory (defaults when absent) and
    /// apply environment overrides.
    pub fn load(home: &Path) -> Result<Self> {
        let path = paths::config_path(home);
        let mut config = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            Self::default()
        };
        config.apply_overrides(
            std::env::var(REMOTE_URL_ENV).ok(),
            std::env::var(REMOTE_KEY_ENV).ok(),
        );
        Ok(config)
    }

    fn apply_overrides(&mut self, url: Option<String>, key: Option<String>) {
        let url = url.filter(|u| !u.trim().is_empty());
        let key = key.filter(|k| !k.trim().is_empty());
        match (&mut self.remote, url) {
            (Some(remote), Some(url)) => remote.url = url,
            (None, Some(url)) => self.remote = Some(RemoteConfig::new(url, "")),
            _ => {}
        }
        if let (Some(remote), Some(key)) = (&mut self.remote, key) {
            remote.api_key = key;
        }
    }

    pub fn local_debounce(&self) -> Duration {
        Duration::from_millis(self.local_debounce_ms)
    }

    pub fn mirror_delay(&self) -> Duration {
        Duration::from_millis(self.mirror_delay_ms)
    }
}
