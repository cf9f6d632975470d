//! Runtime configuration for the directory core.
//!
//! # Responsibility
//! - Load settings from JSON and environment overrides.
//! - Reject values the core cannot run with before anything starts.
//!
//! # Invariants
//! - Every field has a default, so an empty document is a valid config.
//! - Environment overrides win over file values.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 300;
pub const DEFAULT_LOG_MAX_FILE_MB: u64 = 10;
pub const DEFAULT_LOG_KEEP_FILES: usize = 5;

pub const ENV_BASE_URL: &str = "CONTACTBOOK_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "CONTACTBOOK_REQUEST_TIMEOUT_MS";
pub const ENV_REFRESH_INTERVAL_MS: &str = "CONTACTBOOK_REFRESH_INTERVAL_MS";
pub const ENV_SEARCH_DEBOUNCE_MS: &str = "CONTACTBOOK_SEARCH_DEBOUNCE_MS";

/// Configuration loading/validation errors.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    InvalidValue {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config document: {err}"),
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid value `{value}` for `{key}`: {reason}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Directory core settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Service root; `/contacts` is appended per request.
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub refresh_interval_ms: u64,
    pub search_debounce_ms: u64,
    /// Log level for `init_logging`; build-mode default when absent.
    pub log_level: Option<String>,
    /// Absolute log directory; file logging is off when absent.
    pub log_dir: Option<String>,
    /// Size at which the current log file is rotated.
    pub log_max_file_mb: u64,
    /// Rotated log files kept on disk.
    pub log_keep_files: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            log_level: None,
            log_dir: None,
            log_max_file_mb: DEFAULT_LOG_MAX_FILE_MB,
            log_keep_files: DEFAULT_LOG_KEEP_FILES,
        }
    }
}

impl DirectoryConfig {
    /// Parses a JSON document; missing fields take defaults.
    pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(document)?)
    }

    /// Reads and parses a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&document)
    }

    /// Applies `CONTACTBOOK_*` environment overrides from the process env.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_BASE_URL) {
            self.base_url = value.trim().to_string();
        }
        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            self.request_timeout_ms = parse_millis(ENV_REQUEST_TIMEOUT_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_REFRESH_INTERVAL_MS) {
            self.refresh_interval_ms = parse_millis(ENV_REFRESH_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_SEARCH_DEBOUNCE_MS) {
            self.search_debounce_ms = parse_millis(ENV_SEARCH_DEBOUNCE_MS, &value)?;
        }
        Ok(self)
    }

    /// Checks that the core can run with these settings.
    ///
    /// # Errors
    /// - Base URL is empty or not `http://`/`https://`.
    /// - Any duration or log rotation limit is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(invalid("base_url", base_url, "must not be empty"));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid(
                "base_url",
                base_url,
                "must start with http:// or https://",
            ));
        }
        for (key, value) in [
            ("request_timeout_ms", self.request_timeout_ms),
            ("refresh_interval_ms", self.refresh_interval_ms),
            ("search_debounce_ms", self.search_debounce_ms),
            ("log_max_file_mb", self.log_max_file_mb),
        ] {
            if value == 0 {
                return Err(invalid(key, "0", "must be greater than zero"));
            }
        }
        if self.log_keep_files == 0 {
            return Err(invalid("log_keep_files", "0", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }
}

fn parse_millis(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| invalid(key, value, "expected a whole number of milliseconds"))
}

fn invalid(key: &'static str, value: &str, reason: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason,
    }
}
