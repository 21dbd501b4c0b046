//! Tracing subscriber setup.
//!
//! Log level comes from `RUST_LOG` and falls back to the given default. When a
//! log file is configured, output goes through a non-blocking
//! `tracing-appender` writer; the returned [`LoggingGuard`] must be kept alive
//! for buffered lines to be flushed.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Log file path has no file name: {0}")]
    InvalidPath(PathBuf),

    #[error("Failed to create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Global subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Keeps the background log writer alive.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}

/// Installs the global tracing subscriber.
///
/// # Arguments
///
/// * `default_filter` - Filter used when `RUST_LOG` is unset
/// * `log_file` - Optional file receiving log output instead of stderr
pub fn init_logging(
    default_filter: &str,
    log_file: Option<&Path>,
) -> Result<LoggingGuard, LoggingError> {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), default_filter)?;

    match log_file {
        Some(path) => {
            let file_name = path
                .file_name()
                .ok_or_else(|| LoggingError::InvalidPath(path.to_path_buf()))?;
            let directory = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            std::fs::create_dir_all(&directory)?;

            let appender = tracing_appender::rolling::never(&directory, file_name);
            let (writer, worker) = tracing_appender::non_blocking(appender);

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .try_init()
                .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))?;

            Ok(LoggingGuard {
                _worker: Some(worker),
            })
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))?;

            Ok(LoggingGuard { _worker: None })
        }
    }
}

fn build_filter(env: Option<&str>, default_filter: &str) -> Result<EnvFilter, LoggingError> {
    let directives = env
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(default_filter);
    EnvFilter::try_new(directives).map_err(|e| LoggingError::Filter {
        filter: directives.to_string(),
        reason: e.to_string(),
    })
}
