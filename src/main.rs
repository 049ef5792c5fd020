//! OCPP station simulator
//!
//! Connects to a CSMS as a charging station, plays conformance use cases
//! and reports which replies did not match.

use std::path::PathBuf;

use clap::Parser;
use station_sim::commands::Commands;
use station_sim::common::config::Config;
use station_sim::common::logging;
use station_sim::{cli, Result};

#[derive(Parser)]
#[command(name = "station-sim", about = "OCPP 2.0.1 charging station simulator")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write debug logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.log_file {
        Some(path) => {
            logging::init_with_file(path);
        }
        None => logging::init_cli(),
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    cli::dispatch(cli.command, config).await
}
