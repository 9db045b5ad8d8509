//! Job submission commands

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use relayq_client::{JobHandle, JobClient};
use relayq_core::domain::worker::WorkerTag;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Config;

#[derive(Subcommand)]
pub enum JobCommands {
    /// Run a shell command on a worker
    Run {
        /// Command line, passed to `sh -c`
        command: String,

        /// Working directory on the worker
        #[arg(long)]
        cwd: Option<String>,

        /// Pin to a worker class (mac-mini, rpi4); any worker if omitted
        #[arg(long)]
        worker: Option<String>,

        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Transcode a video with ffmpeg on the mac worker
    Transcode {
        /// Input file, as seen by the worker
        input: String,

        /// Output file; defaults to <stem>_transcoded.mp4 next to the input
        #[arg(long)]
        output: Option<String>,

        /// ffmpeg output options
        #[arg(long, allow_hyphen_values = true)]
        options: Option<String>,

        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Transcribe an audio file with whisper on the mac worker
    Transcribe {
        /// Audio file, as seen by the worker
        audio: String,

        /// Whisper model name
        #[arg(long)]
        model: Option<String>,

        #[command(flatten)]
        wait: WaitArgs,
    },
    /// Wait for a submitted job and print its result
    Wait {
        /// Job ID
        job_id: Uuid,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(clap::Args)]
pub struct WaitArgs {
    /// Block until the job finishes and print its result
    #[arg(long)]
    wait: bool,

    /// Give up waiting after this many seconds
    #[arg(long, requires = "wait")]
    timeout: Option<u64>,
}

impl WaitArgs {
    fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = config.job_client();

    match command {
        JobCommands::Run {
            command,
            cwd,
            worker,
            wait,
        } => {
            let worker = worker.as_deref().map(routing_key);
            let handle = client
                .run(&command, cwd.as_deref(), worker)
                .await
                .context("Failed to submit command")?;
            submitted(&handle, wait).await
        }
        JobCommands::Transcode {
            input,
            output,
            options,
            wait,
        } => {
            let handle = client
                .transcode(&input, output.as_deref(), options.as_deref())
                .await
                .context("Failed to submit transcode")?;
            submitted(&handle, wait).await
        }
        JobCommands::Transcribe { audio, model, wait } => {
            let handle = client
                .transcribe(&audio, model.as_deref())
                .await
                .context("Failed to submit transcription")?;
            submitted(&handle, wait).await
        }
        JobCommands::Wait { job_id, timeout } => {
            wait_for(&client, job_id, timeout.map(Duration::from_secs)).await
        }
    }
}

/// Accepts the policy spellings of a worker class as well as routing keys
fn routing_key(worker: &str) -> &str {
    WorkerTag::parse(worker).map_or(worker, |tag| tag.as_str())
}

async fn submitted(handle: &JobHandle, wait: WaitArgs) -> Result<()> {
    println!("{} {}", "Submitted job".green(), handle.id().to_string().bold());
    if !wait.wait {
        println!("  {}", format!("relayq wait {}", handle.id()).dimmed());
        return Ok(());
    }
    print_result(handle, wait.timeout()).await
}

async fn wait_for(client: &JobClient, job_id: Uuid, timeout: Option<Duration>) -> Result<()> {
    let handle = client.handle(job_id);
    print_result(&handle, timeout).await
}

async fn print_result(handle: &JobHandle, timeout: Option<Duration>) -> Result<()> {
    println!("{} Waiting for job {}...", "▸".cyan(), handle.id());
    let result = handle.wait(timeout).await?;
    println!("{}", render(&result));
    Ok(())
}

/// Strings print raw so command output keeps its line breaks
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_routing_key_aliases() {
        assert_eq!(routing_key("macmini"), "mac-mini");
        assert_eq!(routing_key("mac"), "mac-mini");
        assert_eq!(routing_key("rpi4"), "rpi4");
        assert_eq!(routing_key("gpu-box"), "gpu-box");
    }

    #[test]
    fn test_render() {
        assert_eq!(render(&json!("line 1\nline 2")), "line 1\nline 2");
        assert_eq!(render(&Value::Null), "");
        assert!(render(&json!({"status": "success"})).contains("\"status\": \"success\""));
    }
}
