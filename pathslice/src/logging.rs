//! Logging setup for hosts embedding the library.
//!
//! The library itself only emits `tracing` events. A host that has no
//! subscriber of its own can call [`init_logging`] once at startup to get
//! console output on stderr and, optionally, a plain-text log file written
//! by a background thread.
//!
//! `RUST_LOG` takes precedence over the configured level.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when neither the config nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Where and how much to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directives, e.g. `info` or `pathslice::scheduler=debug,warn`.
    pub level: String,
    /// Optional log file. Its directory is created if missing.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,

    #[error("invalid log filter '{directives}': {reason}")]
    InvalidFilter { directives: String, reason: String },

    #[error("invalid log file path: {0}")]
    InvalidPath(PathBuf),

    #[error("failed to create log directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Installs the global subscriber.
///
/// Returns the file writer's guard when a log file is configured; dropping
/// it flushes and stops the writer thread, so the host keeps it alive until
/// shutdown.
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = build_filter(&config.level)?;

    let console = fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = match &config.file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_timer(LocalTime::rfc_3339())
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(guard)
}

fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(env) if !env.trim().is_empty() => env,
        _ => level.to_string(),
    };
    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        reason: e.to_string(),
        directives,
    })
}

fn split_log_path(path: &Path) -> Result<(&Path, &std::ffi::OsStr), LoggingError> {
    let name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidPath(path.to_path_buf()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(config.file.is_none());
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/pathslice.log")).unwrap();
        assert_eq!(dir, Path::new("/var/log"));
        assert_eq!(name, "pathslice.log");

        let (dir, name) = split_log_path(Path::new("nav.log")).unwrap();
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "nav.log");

        assert!(matches!(
            split_log_path(Path::new("/")),
            Err(LoggingError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig::new().with_level("warn");
        // The first call fails too if a subscriber is already installed.
        let _ = init_logging(&config);
        assert!(matches!(
            init_logging(&config),
            Err(LoggingError::AlreadyInitialized)
        ));
    }
}
