//! Scheduler configuration.
//!
//! [`SchedulerConfig`] holds the tunables recognized by the scheduler. Values
//! can be set programmatically with the `with_*` builders or loaded from the
//! `[scheduler]` section of an INI file (see [`file`]).

mod file;

pub use file::{config_file_path, ConfigKey};

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

// ==================== Defaults ====================

/// Default number of image loads allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 2;

/// Default delay between a thumbnail settling and its full-tier prefetch.
pub const DEFAULT_PROMOTION_DELAY_MS: u64 = 5000;

/// Default dispatcher tick period.
pub const DEFAULT_DISPATCH_TICK_MS: u64 = 100;

/// Default distance outside the viewport at which images count as visible.
pub const DEFAULT_VIEWPORT_MARGIN_PX: u32 = 200;

/// Default period of the detached-placeholder cleanup pass.
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 1000;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The INI file could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// A key carried a value of the wrong shape.
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// The key is not a recognized configuration key.
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

/// Tunables for the media-loading scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerConfig {
    /// Maximum number of loads in flight. Must be at least 1.
    pub max_concurrent: usize,

    /// Delay before a settled thumbnail's full tier is queued, in ms.
    pub promotion_delay_ms: u64,

    /// Dispatcher tick period in ms.
    pub dispatch_tick_ms: u64,

    /// Viewport margin in pixels used by the viewport tracker.
    pub viewport_margin_px: u32,

    /// Period of the placeholder cleanup pass in ms.
    pub cleanup_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            promotion_delay_ms: DEFAULT_PROMOTION_DELAY_MS,
            dispatch_tick_ms: DEFAULT_DISPATCH_TICK_MS,
            viewport_margin_px: DEFAULT_VIEWPORT_MARGIN_PX,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
        }
    }
}

impl SchedulerConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency budget.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    /// Set the promotion delay.
    pub fn with_promotion_delay_ms(mut self, ms: u64) -> Self {
        self.promotion_delay_ms = ms;
        self
    }

    /// Set the dispatcher tick period.
    pub fn with_dispatch_tick_ms(mut self, ms: u64) -> Self {
        self.dispatch_tick_ms = ms;
        self
    }

    /// Set the viewport margin.
    pub fn with_viewport_margin_px(mut self, px: u32) -> Self {
        self.viewport_margin_px = px;
        self
    }

    /// Set the cleanup interval.
    pub fn with_cleanup_interval_ms(mut self, ms: u64) -> Self {
        self.cleanup_interval_ms = ms;
        self
    }

    /// Promotion delay as a `Duration`.
    pub fn promotion_delay(&self) -> Duration {
        Duration::from_millis(self.promotion_delay_ms)
    }

    /// Dispatcher tick period as a `Duration`.
    pub fn dispatch_tick(&self) -> Duration {
        Duration::from_millis(self.dispatch_tick_ms)
    }

    /// Cleanup interval as a `Duration`.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }

    /// Checks the values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent == 0 {
            return Err(ConfigError::InvalidValue {
                key: ConfigKey::MaxConcurrent.name().to_string(),
                value: "0".to_string(),
                reason: "at least one concurrent load is required".to_string(),
            });
        }
        if self.dispatch_tick_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: ConfigKey::DispatchTickMs.name().to_string(),
                value: "0".to_string(),
                reason: "tick period must be positive".to_string(),
            });
        }
        Ok(())
    }
}
