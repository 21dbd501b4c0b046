//! INI-backed configuration file.
//!
//! The scheduler reads the `[scheduler]` section:
//!
//! ```ini
//! [scheduler]
//! max_concurrent = 2
//! promotion_delay_ms = 5000
//! dispatch_tick_ms = 100
//! viewport_margin_px = 200
//! cleanup_interval_ms = 1000
//! ```
//!
//! Missing keys keep their defaults. Unknown keys in the section are ignored
//! with a warning.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use tracing::warn;

use super::{ConfigError, SchedulerConfig};

/// INI section holding scheduler settings.
pub const SCHEDULER_SECTION: &str = "scheduler";

/// Configuration file name inside the application config directory.
const CONFIG_FILE_NAME: &str = "config.ini";

/// Application directory name under the user config dir.
const APP_DIR_NAME: &str = "chatmedia";

/// Returns the default configuration file path
/// (`<user config dir>/chatmedia/config.ini`).
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// A recognized configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    MaxConcurrent,
    PromotionDelayMs,
    DispatchTickMs,
    ViewportMarginPx,
    CleanupIntervalMs,
}

impl ConfigKey {
    /// All keys, in display order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::MaxConcurrent,
            ConfigKey::PromotionDelayMs,
            ConfigKey::DispatchTickMs,
            ConfigKey::ViewportMarginPx,
            ConfigKey::CleanupIntervalMs,
        ]
    }

    /// Key name as written in the INI file.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::MaxConcurrent => "max_concurrent",
            ConfigKey::PromotionDelayMs => "promotion_delay_ms",
            ConfigKey::DispatchTickMs => "dispatch_tick_ms",
            ConfigKey::ViewportMarginPx => "viewport_margin_px",
            ConfigKey::CleanupIntervalMs => "cleanup_interval_ms",
        }
    }

    /// Reads this key's value from a config as a string.
    pub fn get(&self, config: &SchedulerConfig) -> String {
        match self {
            ConfigKey::MaxConcurrent => config.max_concurrent.to_string(),
            ConfigKey::PromotionDelayMs => config.promotion_delay_ms.to_string(),
            ConfigKey::DispatchTickMs => config.dispatch_tick_ms.to_string(),
            ConfigKey::ViewportMarginPx => config.viewport_margin_px.to_string(),
            ConfigKey::CleanupIntervalMs => config.cleanup_interval_ms.to_string(),
        }
    }

    /// Parses `value` and stores it into `config`.
    pub fn set(&self, config: &mut SchedulerConfig, value: &str) -> Result<(), ConfigError> {
        match self {
            ConfigKey::MaxConcurrent => config.max_concurrent = self.parse(value)?,
            ConfigKey::PromotionDelayMs => config.promotion_delay_ms = self.parse(value)?,
            ConfigKey::DispatchTickMs => config.dispatch_tick_ms = self.parse(value)?,
            ConfigKey::ViewportMarginPx => config.viewport_margin_px = self.parse(value)?,
            ConfigKey::CleanupIntervalMs => config.cleanup_interval_ms = self.parse(value)?,
        }
        Ok(())
    }

    fn parse<T>(&self, value: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: self.name().to_string(),
                value: value.to_string(),
                reason: e.to_string(),
            })
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix("scheduler.").unwrap_or(s);
        ConfigKey::all()
            .iter()
            .copied()
            .find(|key| key.name() == name)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

impl SchedulerConfig {
    /// Parses configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_ini(&ini)
    }

    /// Loads configuration from an INI file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| match e {
            ini::Error::Io(io) => ConfigError::Io(io),
            ini::Error::Parse(parse) => ConfigError::Parse(parse.to_string()),
        })?;
        Self::from_ini(&ini)
    }

    /// Loads from `path` if given, else from the default location if that
    /// file exists, else returns defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match config_file_path() {
                Some(default) if default.exists() => Self::load(&default),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Writes the configuration to `path` as INI.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.to_ini().write_to_file(path)?;
        Ok(())
    }

    /// Renders the configuration as an INI document.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(SCHEDULER_SECTION))
                .set(key.name(), key.get(self));
        }
        ini
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(section) = ini.section(Some(SCHEDULER_SECTION)) {
            for (name, value) in section.iter() {
                match name.parse::<ConfigKey>() {
                    Ok(key) => key.set(&mut config, value)?,
                    Err(_) => warn!(key = name, "Ignoring unknown scheduler setting"),
                }
            }
        }
        config.validate()?;
        Ok(config)
    }
}
