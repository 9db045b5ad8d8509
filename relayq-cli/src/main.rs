//! RelayQ CLI
//!
//! Command-line interface for submitting jobs to the RelayQ fleet and
//! inspecting it.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use relayq_core::policy::DEFAULT_POLICY_PATH;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relayq")]
#[command(about = "RelayQ personal job orchestrator CLI", long_about = None)]
struct Cli {
    /// Broker URL
    #[arg(long, env = "RELAYQ_BROKER_URL", default_value = "http://localhost:8765")]
    broker_url: String,

    /// Routing policy document
    #[arg(long, env = "RELAYQ_POLICY", default_value = DEFAULT_POLICY_PATH)]
    policy: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        broker_url: cli.broker_url,
        policy_path: cli.policy,
    };

    handle_command(cli.command, &config).await
}
