//! pathslice CLI - frame-loop harness for the time-sliced pathfinding core
//!
//! Builds a tiled grid world, spawns agents that keep asking for paths and
//! drives the simulation frame by frame, the way a host engine would.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use pathslice::{init_logging, NavConfig};
use tracing::debug;

mod commands;
mod error;

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "pathslice")]
#[command(version, about = "Time-sliced A* pathfinding under a per-frame CPU budget")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter, overrides the config file (e.g. debug, pathslice::scheduler=trace)
    #[arg(long, global = true, value_name = "FILTER")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and print per-run statistics
    Simulate(SimulateArgs),

    /// Inspect the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.unwrap_or_else(NavConfig::default_path);

    match cli.command {
        Commands::Config { action } => commands::config::run(action, &config_path),
        Commands::Simulate(args) => {
            let config = NavConfig::load_or_default(&config_path)?;

            let mut logging = config.logging.clone();
            if let Some(level) = cli.log_level {
                logging.level = level;
            }
            let _guard = init_logging(&logging).map_err(pathslice::Error::from)?;
            debug!(path = %config_path.display(), "Using configuration");

            commands::simulate::run(args, config)
        }
    }
}
