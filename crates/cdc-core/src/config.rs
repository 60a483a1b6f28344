use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::fetcher::FetchOptions;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per blob (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/cas-disk-cache/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdcConfig {
    /// Number of concurrent downloads.
    pub concurrency: usize,
    /// Cache directory; `None` = `~/.cache/cas-disk-cache`.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    /// Abort a transfer slower than this many bytes/s for `low_speed_time_secs`.
    pub low_speed_limit_bytes: u32,
    pub low_speed_time_secs: u64,
    /// Hard per-blob transfer timeout.
    pub timeout_secs: u64,
    /// Optional retry policy; if missing, a failed fetch is not retried.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for CdcConfig {
    fn default() -> Self {
        Self {
            concurrency: crate::dispatcher::DEFAULT_CONCURRENCY,
            cache_dir: None,
            connect_timeout_secs: 30,
            low_speed_limit_bytes: 1024,
            low_speed_time_secs: 60,
            timeout_secs: 3600,
            retry: None,
        }
    }
}

impl CdcConfig {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            low_speed_limit: self.low_speed_limit_bytes,
            low_speed_time: Duration::from_secs(self.low_speed_time_secs),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    /// Configured cache dir, or the XDG cache home default.
    pub fn resolve_cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("cas-disk-cache")?;
        Ok(xdg_dirs.get_cache_home())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("cas-disk-cache")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CdcConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = CdcConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: CdcConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
