//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod select;
mod status;

pub use job::JobCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Pick a destination for a job type under the routing policy
    Select {
        /// Job type as named in the policy routes
        job_type: String,

        /// Job parameters as a JSON object, e.g. '{"size_mb": 120}'
        #[arg(default_value = "{}")]
        params: String,
    },
    #[command(flatten)]
    Job(JobCommands),
    /// Show the fleet status
    Status {
        /// Print the raw aggregate as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Select { job_type, params } => select::handle_select(&job_type, &params, config),
        Commands::Job(command) => job::handle_job_command(command, config).await,
        Commands::Status { json } => status::show_status(config, json).await,
    }
}
