//! Chatmedia CLI - Command-line interface
//!
//! Drives the progressive media-loading scheduler against a media server and
//! manages its configuration file.

mod commands;
mod error;

use std::path::PathBuf;

use chatmedia::logging::{init_logging, DEFAULT_LOG_FILTER};
use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "chatmedia", version, about = "Progressive image loading for chat attachments")]
struct Cli {
    /// Configuration file (defaults to <config dir>/chatmedia/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load images through the scheduler and print statistics as JSON
    Fetch(FetchArgs),

    /// View or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        e.exit();
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let default_filter = if cli.verbose {
        "chatmedia=debug,info"
    } else {
        DEFAULT_LOG_FILTER
    };
    let _guard = init_logging(default_filter, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Fetch(args) => commands::fetch::run(args, cli.config.as_deref()),
        Commands::Config { command } => commands::config::run(command, cli.config.as_deref()),
    }
}
