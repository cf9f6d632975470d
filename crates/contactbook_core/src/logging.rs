//! File logging for the directory core.
//!
//! # Responsibility
//! - Start one rotating file logger per process from `DirectoryConfig`.
//! - Record panics as metadata-only log events.
//!
//! # Invariants
//! - Starting twice with identical settings is a no-op; different settings
//!   are rejected and the running logger is left alone.
//! - Starting never panics.
//! - Log events carry ids, counts, status codes and durations, never contact
//!   names, emails or phone numbers. Panic payloads can echo form input, so
//!   only the panic location is logged.

use crate::config::DirectoryConfig;
use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, LogSpecification, Logger, LoggerHandle, Naming,
    WriteMode,
};
use log::{error, info, LevelFilter};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

const LOG_FILE_BASENAME: &str = "contactbook";
const BYTES_PER_MIB: u64 = 1024 * 1024;

static ACTIVE_LOGGER: OnceCell<ActiveLogger> = OnceCell::new();

struct ActiveLogger {
    settings: LogSettings,
    _handle: LoggerHandle,
}

/// Resolved file-logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub dir: PathBuf,
    pub max_file_bytes: u64,
    pub keep_files: usize,
}

impl LogSettings {
    /// Resolves settings from `config`. `None` when no log directory is set.
    ///
    /// # Errors
    /// - `log_level` is not a `log` level name.
    /// - `log_dir` is relative.
    pub fn from_config(config: &DirectoryConfig) -> Result<Option<Self>, LoggingError> {
        let Some(dir) = config
            .log_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
        else {
            return Ok(None);
        };
        let dir = PathBuf::from(dir);
        if !dir.is_absolute() {
            return Err(LoggingError::RelativeDir(dir));
        }

        let level = match config.log_level.as_deref() {
            Some(value) => LevelFilter::from_str(value.trim())
                .map_err(|_| LoggingError::InvalidLevel(value.to_string()))?,
            None => default_log_level(),
        };

        Ok(Some(Self {
            level,
            dir,
            max_file_bytes: config.log_max_file_mb.saturating_mul(BYTES_PER_MIB),
            keep_files: config.log_keep_files,
        }))
    }
}

/// Reasons file logging could not start.
#[derive(Debug)]
pub enum LoggingError {
    InvalidLevel(String),
    RelativeDir(PathBuf),
    CreateDir {
        dir: PathBuf,
        source: std::io::Error,
    },
    Backend(FlexiLoggerError),
    /// A logger is already running with other settings.
    AlreadyStarted(LogSettings),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLevel(value) => write!(
                f,
                "unsupported log level `{value}`; expected off|error|warn|info|debug|trace"
            ),
            Self::RelativeDir(dir) => {
                write!(f, "log_dir must be an absolute path, got `{}`", dir.display())
            }
            Self::CreateDir { dir, source } => {
                write!(f, "failed to create log directory `{}`: {source}", dir.display())
            }
            Self::Backend(err) => write!(f, "failed to start logger: {err}"),
            Self::AlreadyStarted(active) => write!(
                f,
                "logging already running at `{}` with level {}",
                active.dir.display(),
                active.level
            ),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDir { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

/// Starts file logging as configured.
///
/// Returns `Ok(false)` when `config` names no log directory.
pub fn init_logging(config: &DirectoryConfig) -> Result<bool, LoggingError> {
    let Some(settings) = LogSettings::from_config(config)? else {
        return Ok(false);
    };

    let active = ACTIVE_LOGGER.get_or_try_init(|| start_logger(&settings, config))?;
    if active.settings != settings {
        return Err(LoggingError::AlreadyStarted(active.settings.clone()));
    }
    Ok(true)
}

/// Settings of the running logger, if any.
pub fn logging_status() -> Option<LogSettings> {
    ACTIVE_LOGGER.get().map(|active| active.settings.clone())
}

/// `Debug` in debug builds, `Info` in release builds.
pub fn default_log_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

fn start_logger(
    settings: &LogSettings,
    config: &DirectoryConfig,
) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(&settings.dir).map_err(|source| LoggingError::CreateDir {
        dir: settings.dir.clone(),
        source,
    })?;

    let spec = LogSpecification::builder().default(settings.level).build();
    let handle = Logger::with(spec)
        .log_to_file(
            FileSpec::default()
                .directory(settings.dir.clone())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(settings.max_file_bytes),
            Naming::Numbers,
            Cleanup::KeepLogFiles(settings.keep_files),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(LoggingError::Backend)?;

    install_panic_hook();
    info!(
        "event=logging_started module=logging status=ok version={} level={} \
         max_file_bytes={} keep_files={} request_timeout_ms={} refresh_interval_ms={} \
         search_debounce_ms={}",
        env!("CARGO_PKG_VERSION"),
        settings.level,
        settings.max_file_bytes,
        settings.keep_files,
        config.request_timeout_ms,
        config.refresh_interval_ms,
        config.search_debounce_ms
    );

    Ok(ActiveLogger {
        settings: settings.clone(),
        _handle: handle,
    })
}

// Runs once: only reached from the successful logger start.
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let thread = std::thread::current()
            .name()
            .unwrap_or("unnamed")
            .to_string();
        error!(
            "event=panic_captured module=logging status=error location={location} thread={thread}"
        );
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, LogSettings, LoggingError, BYTES_PER_MIB};
    use crate::config::DirectoryConfig;
    use log::LevelFilter;

    fn config_with_dir(dir: &str) -> DirectoryConfig {
        DirectoryConfig {
            log_dir: Some(dir.to_string()),
            ..DirectoryConfig::default()
        }
    }

    #[test]
    fn no_log_dir_means_no_file_logging() {
        let config = DirectoryConfig {
            log_dir: Some("   ".to_string()),
            ..DirectoryConfig::default()
        };
        assert!(LogSettings::from_config(&config).unwrap().is_none());
        assert!(!init_logging(&DirectoryConfig::default()).unwrap());
    }

    #[test]
    fn settings_follow_config_rotation_and_level() {
        let config = DirectoryConfig {
            log_level: Some(" WARN ".to_string()),
            log_max_file_mb: 2,
            log_keep_files: 3,
            ..config_with_dir("/var/log/contactbook")
        };
        let settings = LogSettings::from_config(&config).unwrap().unwrap();
        assert_eq!(settings.level, LevelFilter::Warn);
        assert_eq!(settings.max_file_bytes, 2 * BYTES_PER_MIB);
        assert_eq!(settings.keep_files, 3);
    }

    #[test]
    fn bad_level_and_relative_dir_are_rejected() {
        let relative = config_with_dir("logs/dev");
        assert!(matches!(
            LogSettings::from_config(&relative),
            Err(LoggingError::RelativeDir(_))
        ));

        let verbose = DirectoryConfig {
            log_level: Some("verbose".to_string()),
            ..config_with_dir("/var/log/contactbook")
        };
        let err = LogSettings::from_config(&verbose).unwrap_err();
        assert!(err.to_string().contains("verbose"));
    }

    // The only test in this binary that starts the global logger. The
    // directory is left behind because the logger keeps writing to it.
    #[test]
    fn repeated_start_is_idempotent_and_conflicts_are_rejected() {
        let dir = std::env::temp_dir().join(format!("contactbook-logs-{}", std::process::id()));
        let config = DirectoryConfig {
            log_level: Some("info".to_string()),
            ..config_with_dir(dir.to_str().unwrap())
        };

        assert!(init_logging(&config).unwrap());
        assert!(init_logging(&config).unwrap());

        let more_files = DirectoryConfig {
            log_keep_files: config.log_keep_files + 1,
            ..config.clone()
        };
        assert!(matches!(
            init_logging(&more_files),
            Err(LoggingError::AlreadyStarted(_))
        ));

        let active = logging_status().unwrap();
        assert_eq!(active.dir, dir);
        assert_eq!(active.level, LevelFilter::Info);
    }
}
