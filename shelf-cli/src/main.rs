//! # shelf-sync
//!
//! CLI driver for the shelf-sync coordinator.
//!
//! ## Commands
//!
//! - `run`: Start the coordinator against in-memory services and drive it
//!   from stdin (`online`, `offline`, `login`, `logout`, `refresh`, `sync`,
//!   `status`, `quit`)
//! - `config`: Print the effective configuration
//!
//! ## Example
//!
//! ```bash
//! # Start with the default (or ~/.config) configuration
//! shelf-sync run
//!
//! # Use an explicit config file and debug logging
//! RUST_LOG=debug shelf-sync --config shelf.toml run
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use commands::{run, show_config};
use config::Config;

/// CLI driver for the shelf-sync coordinator.
#[derive(Parser, Debug)]
#[command(name = "shelf-sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults to the per-user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the coordinator and read commands from stdin
    Run {
        /// Start offline regardless of the config file
        #[arg(long)]
        offline: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { offline } => {
            if offline {
                config.connectivity.initially_connected = false;
            }
            run::run(&config).await?;
        }
        Commands::Config => {
            show_config::run(&config)?;
        }
    }

    Ok(())
}
