//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, `config show` and
//! `config path` for viewing and modifying scheduler settings.

use std::path::{Path, PathBuf};

use chatmedia::config::{config_file_path, ConfigKey};
use chatmedia::SchedulerConfig;
use clap::Subcommand;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key (e.g., scheduler.max_concurrent)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., scheduler.max_concurrent)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration settings
    List,

    /// Print the effective configuration as JSON
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
///
/// `config_path` overrides the default configuration file location.
pub fn run(command: ConfigCommands, config_path: Option<&Path>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => {
            println!("{}", get_value(&key, config_path)?);
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            let (name, path) = set_value(&key, &value, config_path)?;
            println!("Set {} = {} in {}", name, value, path.display());
            Ok(())
        }
        ConfigCommands::List => run_list(config_path),
        ConfigCommands::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| CliError::Runtime(e.to_string()))?;
            println!("{}", json);
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", resolve_path(config_path)?.display());
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'chatmedia config list' to see available keys.",
            key
        ))
    })
}

fn resolve_path(config_path: Option<&Path>) -> Result<PathBuf, CliError> {
    match config_path {
        Some(path) => Ok(path.to_path_buf()),
        None => config_file_path().ok_or_else(|| {
            CliError::Config("Could not determine the user configuration directory".to_string())
        }),
    }
}

/// Loads the configuration, falling back to defaults when the file is missing.
fn load_config(config_path: Option<&Path>) -> Result<SchedulerConfig, CliError> {
    let path = resolve_path(config_path)?;
    if path.exists() {
        Ok(SchedulerConfig::load(&path)?)
    } else {
        Ok(SchedulerConfig::default())
    }
}

/// Reads one value from the effective configuration.
fn get_value(key: &str, config_path: Option<&Path>) -> Result<String, CliError> {
    let config_key = parse_key(key)?;
    let config = load_config(config_path)?;
    Ok(config_key.get(&config))
}

/// Updates one value and writes the file back.
fn set_value(
    key: &str,
    value: &str,
    config_path: Option<&Path>,
) -> Result<(&'static str, PathBuf), CliError> {
    let config_key = parse_key(key)?;
    let path = resolve_path(config_path)?;

    let mut config = load_config(Some(&path))?;
    config_key.set(&mut config, value)?;
    config.validate()?;
    config.save(&path)?;

    Ok((config_key.name(), path))
}

fn run_list(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;

    println!("Configuration Settings");
    println!("======================");
    println!();
    println!("[scheduler]");
    for key in ConfigKey::all() {
        println!("  {} = {}", key.name(), key.get(&config));
    }

    Ok(())
}
