//! Configuration loading from biblioteca.toml.

use access::PolicySet;
use accounts::AccountSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Extra access rules (`[[policies]]`), evaluated after the defaults.
    #[serde(flatten)]
    pub rules: PolicySet,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// Directory holding users.db and cache.db.
    pub data_dir: Option<PathBuf>,
}

/// Where cached reads and sessions live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// cache.db in the data directory; shared across invocations.
    #[default]
    Sqlite,
    /// In-process only; sessions do not outlive the command.
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: u64,

    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_minutes: default_token_ttl_minutes(),
            min_password_len: default_min_password_len(),
        }
    }
}

/// One year.
const MAX_TOKEN_TTL_MINUTES: u64 = 365 * 24 * 60;

fn default_cache_ttl_secs() -> u64 {
    60
}

fn default_token_ttl_minutes() -> u64 {
    30
}

fn default_min_password_len() -> usize {
    8
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load from `path` if it exists, otherwise use defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Invalid("cache.ttl_secs must be positive".into()));
        }
        if self.auth.token_ttl_minutes == 0 {
            return Err(ConfigError::Invalid(
                "auth.token_ttl_minutes must be positive".into(),
            ));
        }
        if self.auth.token_ttl_minutes > MAX_TOKEN_TTL_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "auth.token_ttl_minutes must be at most {MAX_TOKEN_TTL_MINUTES}"
            )));
        }
        self.rules
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Account service settings derived from this configuration.
    pub fn account_settings(&self) -> AccountSettings {
        AccountSettings {
            cache_ttl: Duration::from_secs(self.cache.ttl_secs),
            token_ttl: Duration::from_secs(self.auth.token_ttl_minutes.saturating_mul(60)),
            min_password_len: self.auth.min_password_len,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}
