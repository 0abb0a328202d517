use crate::error::{Result, VaimmError};
use crate::fetch::{default_user_agent, FetchSettings, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_JSON_DIR: &str = "TVAI_MODEL_DIR";
pub const ENV_MODEL_DIR: &str = "TVAI_MODEL_DATA_DIR";
pub const ENV_BACKEND: &str = "TVAI_BACKEND";
pub const ENV_COOKIE: &str = "TVAI_COOKIE";

/// Main configuration structure
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct PathsConfig {
    /// Directory holding the model json files
    pub json_dir: Option<PathBuf>,
    /// Directory the model files are downloaded into
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct DownloadConfig {
    pub backend: Option<String>,
    pub cookie: Option<String>,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "default_initial_wait_secs")]
    pub initial_wait_secs: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct HardwareConfig {
    /// GPU family for TensorRT models: RTX20, RTX30 or RTX40
    pub gpu_family: Option<String>,
}

// Default value functions
fn default_threads() -> usize {
    4
}
fn default_url_prefix() -> String {
    "https://veai-models.topazlabs.com/".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    30
}
fn default_initial_wait_secs() -> u64 {
    4
}
fn default_backoff_factor() -> u32 {
    4
}
fn default_max_attempts() -> u32 {
    4
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            backend: None,
            cookie: None,
            threads: default_threads(),
            url_prefix: default_url_prefix(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_wait_secs: default_initial_wait_secs(),
            backoff_factor: default_backoff_factor(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Config {
    /// Load config file (if any), then apply `TVAI_*` environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a config file, filling missing values with defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            VaimmError::Config(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// Override values from the `TVAI_*` environment variables
    pub fn apply_env(&mut self) {
        if let Some(dir) = env_value(ENV_JSON_DIR) {
            self.paths.json_dir = Some(PathBuf::from(dir));
        }
        if let Some(dir) = env_value(ENV_MODEL_DIR) {
            self.paths.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(backend) = env_value(ENV_BACKEND) {
            self.download.backend = Some(backend);
        }
        if let Some(cookie) = env_value(ENV_COOKIE) {
            self.download.cookie = Some(cookie);
        }
    }

    /// Retry policy handed to the fetch engine
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_wait: Duration::from_secs(self.retry.initial_wait_secs),
            backoff_factor: self.retry.backoff_factor,
            max_attempts: self.retry.max_attempts.max(1),
        }
    }

    /// CDN settings handed to the transport
    pub fn fetch_settings(&self) -> Result<FetchSettings> {
        let cookie = self.download.cookie.clone().ok_or_else(|| {
            VaimmError::Config(format!(
                "No cf_clearance cookie configured (use --cookie or {ENV_COOKIE})"
            ))
        })?;

        Ok(FetchSettings {
            url_prefix: self.download.url_prefix.clone(),
            cookie,
            user_agent: default_user_agent(),
            connect_timeout: Duration::from_secs(self.download.connect_timeout_secs),
        })
    }
}

/// `$XDG_CONFIG_HOME/vaimm/config.toml`, or the platform config dir
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dirs::config_dir)?;
    Some(base.join("vaimm").join("config.toml"))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
