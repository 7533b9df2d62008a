//! Application configuration.
//!
//! # Responsibility
//! - Resolve default locations for the database and log directory.
//! - Load optional TOML overrides and validate the merged result.
//!
//! # Invariants
//! - A missing config file is not an error; defaults apply.
//! - `sync_interval_secs` is always greater than zero after `validate()`.

use crate::logging::normalize_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides the data directory (database, logs, config).
pub const DATA_HOME_ENV: &str = "QUOTESYNC_DATA_HOME";
/// Overrides the config file path.
pub const CONFIG_PATH_ENV: &str = "QUOTESYNC_CONFIG_PATH";

const APP_DIR_NAME: &str = "quotesync";
const DB_FILE_NAME: &str = "quotes.sqlite3";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

#[derive(Debug)]
pub enum ConfigError {
    Read { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Effective application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite file backing durable key-value storage.
    pub db_path: PathBuf,
    /// Absolute directory for rolling log files.
    pub log_dir: PathBuf,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Period of scheduled sync cycles.
    pub sync_interval_secs: u64,
    /// Push the merged collection back after each cycle.
    pub push_on_sync: bool,
    /// JSON file used as the remote collection, if any.
    pub remote_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            db_path: data_dir.join(DB_FILE_NAME),
            log_dir: data_dir.join("logs"),
            log_level: crate::logging::default_log_level().to_string(),
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            push_on_sync: true,
            remote_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the config file at `path`, or defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_toml_str(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parses and validates TOML contents.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sync_interval_secs must be greater than zero".to_string(),
            ));
        }
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if !self.log_dir.is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "log_dir must be absolute, got `{}`",
                self.log_dir.display()
            )));
        }
        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => PathBuf::from(path),
        None => data_dir().join(CONFIG_FILE_NAME),
    }
}

fn data_dir() -> PathBuf {
    if let Some(path) = std::env::var_os(DATA_HOME_ENV) {
        return PathBuf::from(path);
    }
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}
