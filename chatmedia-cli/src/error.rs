//! CLI error type.

use chatmedia::config::ConfigError;
use chatmedia::logging::LoggingError;
use chatmedia::{FetchError, SchedulerError};
use thiserror::Error;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid usage or configuration value.
    #[error("{0}")]
    Config(String),

    #[error("Configuration file error: {0}")]
    ConfigFile(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Prints the error to stderr and exits with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        std::process::exit(1);
    }
}
