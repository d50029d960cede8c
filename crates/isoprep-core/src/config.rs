use crate::cache::CacheOptions;
use crate::fetch::FetchOptions;
use crate::retry::RetryPolicy;
use crate::scanner::DEFAULT_STAGING_DIR;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Values that parse as TOML but cannot be used.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("timeout_secs must be greater than zero")]
    ZeroTimeout,
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,
    #[error("retry.base_delay_secs must be a finite, non-negative number (got {0})")]
    BadBaseDelay(f64),
}

/// Retry policy parameters (`[retry]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry, doubled for each further one.
    pub base_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 1.0,
        }
    }
}

/// Tool configuration loaded from `~/.config/isoprep/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IsoprepConfig {
    /// Cache root; `$XDG_CACHE_HOME/isoprep` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Staging root scanned in staged mode; `./local_assets` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
    /// Per-request connect/stall timeout in seconds.
    pub timeout_secs: u64,
    /// Receive buffer size in bytes.
    pub chunk_size: usize,
    pub user_agent: String,
    /// `isoprep purge` removes cached files older than this.
    pub cache_max_age_days: u64,
    /// Run the script content check on obtained scripts.
    pub validate_scripts: bool,
    pub retry: RetryConfig,
}

impl Default for IsoprepConfig {
    fn default() -> Self {
        let fetch = FetchOptions::default();
        Self {
            cache_dir: None,
            staging_dir: None,
            timeout_secs: fetch.timeout.as_secs(),
            chunk_size: fetch.chunk_size,
            user_agent: fetch.user_agent,
            cache_max_age_days: 30,
            validate_scripts: true,
            retry: RetryConfig::default(),
        }
    }
}

impl IsoprepConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::ZeroChunkSize);
        }
        let d = self.retry.base_delay_secs;
        if !d.is_finite() || d < 0.0 {
            return Err(ConfigError::BadBaseDelay(d));
        }
        Ok(())
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            retry: RetryPolicy {
                max_retries: self.retry.max_retries,
                base_delay: Duration::from_secs_f64(self.retry.base_delay_secs.max(0.0)),
            },
            timeout: Duration::from_secs(self.timeout_secs),
            chunk_size: self.chunk_size,
            user_agent: self.user_agent.clone(),
        }
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            validate_scripts: self.validate_scripts,
        }
    }

    pub fn cache_root(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let xdg_dirs = xdg::BaseDirectories::with_prefix("isoprep")?;
                Ok(xdg_dirs.create_cache_directory("")?)
            }
        }
    }

    pub fn staging_root(&self) -> PathBuf {
        self.staging_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STAGING_DIR))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("isoprep")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<IsoprepConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = IsoprepConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load and validate configuration from an explicit path.
pub fn load_from(path: &Path) -> Result<IsoprepConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: IsoprepConfig = toml::from_str(&data)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = IsoprepConfig::default();
        assert_eq!(cfg.timeout_secs, 30);
        assert_eq!(cfg.chunk_size, 8192);
        assert_eq!(cfg.cache_max_age_days, 30);
        assert!(cfg.validate_scripts);
        assert!(cfg.user_agent.starts_with("isoprep/"));
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.staging_root(), PathBuf::from("local_assets"));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = IsoprepConfig {
            cache_dir: Some(PathBuf::from("/var/cache/isoprep")),
            ..IsoprepConfig::default()
        };
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: IsoprepConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.cache_dir, cfg.cache_dir);
        assert_eq!(parsed.timeout_secs, cfg.timeout_secs);
        assert_eq!(parsed.chunk_size, cfg.chunk_size);
        assert_eq!(parsed.user_agent, cfg.user_agent);
        assert_eq!(parsed.retry.max_retries, cfg.retry.max_retries);
    }

    #[test]
    fn config_toml_partial_uses_defaults() {
        let toml = r#"
            timeout_secs = 5
            staging_dir = "/srv/stage"

            [retry]
            base_delay_secs = 0.5
        "#;
        let cfg: IsoprepConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.timeout_secs, 5);
        assert_eq!(cfg.chunk_size, 8192);
        assert_eq!(cfg.staging_root(), PathBuf::from("/srv/stage"));
        assert_eq!(cfg.retry.max_retries, 3);

        let fetch = cfg.fetch_options();
        assert_eq!(fetch.timeout, Duration::from_secs(5));
        assert_eq!(fetch.retry.base_delay, Duration::from_millis(500));
        assert_eq!(fetch.retry.max_retries, 3);
    }

    #[test]
    fn explicit_cache_dir_wins() {
        let cfg = IsoprepConfig {
            cache_dir: Some(PathBuf::from("/tmp/c")),
            ..IsoprepConfig::default()
        };
        assert_eq!(cfg.cache_root().unwrap(), PathBuf::from("/tmp/c"));
        assert!(cfg.cache_options().validate_scripts);
    }

    #[test]
    fn load_from_rejects_unusable_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "chunk_size = 0\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConfigError>(),
            Some(&ConfigError::ZeroChunkSize)
        );

        fs::write(&path, "[retry]\nbase_delay_secs = -1.0\n").unwrap();
        assert!(load_from(&path).is_err());

        fs::write(&path, "validate_scripts = false\n").unwrap();
        assert!(!load_from(&path).unwrap().validate_scripts);
    }
}
