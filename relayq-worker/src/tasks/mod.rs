//! Task contracts
//!
//! Every task the worker accepts is a named contract: a handler plus the
//! delivery rules the broker and poller honour for it. All contracts are
//! acknowledged late, so a worker lost mid-task causes redelivery and task
//! bodies must tolerate running twice.

mod command;
mod process;
mod transcode;
mod transcribe;

pub use command::RunCommand;
pub use transcode::TranscodeVideo;
pub use transcribe::TranscribeAudio;

use async_trait::async_trait;
use relayq_core::domain::job::{Job, TaskArgs, TaskKind};
use relayq_core::domain::task::{TaskFailure, TaskOutcome};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::Config;

/// Body of a task
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, args: &TaskArgs) -> Result<Value, TaskFailure>;
}

/// Delivery rules attached to a task name
#[derive(Debug, Clone)]
pub struct TaskContract {
    pub name: &'static str,
    /// Prefix of the timeout message, e.g. "Command" in "Command timed out after 5 hours"
    pub label: &'static str,
    /// Hard wall-clock limit; the body is dropped (and its child killed) past it
    pub time_limit: Duration,
    /// Acknowledge only after the body returns
    pub acks_late: bool,
}

impl TaskContract {
    pub fn new(kind: TaskKind, label: &'static str, time_limit: Duration) -> Self {
        Self {
            name: kind.name(),
            label,
            time_limit,
            acks_late: true,
        }
    }
}

struct Registered {
    contract: TaskContract,
    handler: Arc<dyn TaskHandler>,
}

/// Name → contract lookup used by the poller
#[derive(Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<&'static str, Registered>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The three built-in contracts, wired to the configured tools
    pub fn standard(config: &Config) -> Self {
        let limit = config.task_time_limit;
        let mut registry = Self::new();
        registry.register(
            TaskContract::new(TaskKind::RunCommand, "Command", limit),
            RunCommand,
        );
        registry.register(
            TaskContract::new(TaskKind::TranscodeVideo, "Transcode", limit),
            TranscodeVideo::new(config.ffmpeg_bin.clone()),
        );
        registry.register(
            TaskContract::new(TaskKind::TranscribeAudio, "Transcription", limit),
            TranscribeAudio::new(config.whisper_bin.clone()),
        );
        registry
    }

    pub fn register(&mut self, contract: TaskContract, handler: impl TaskHandler + 'static) {
        self.tasks.insert(
            contract.name,
            Registered {
                contract,
                handler: Arc::new(handler),
            },
        );
    }

    pub fn contract(&self, name: &str) -> Option<&TaskContract> {
        self.tasks.get(name).map(|registered| &registered.contract)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tasks.keys().copied()
    }

    /// Runs a delivered job under its contract and reports exactly one outcome
    pub async fn execute(&self, job: &Job) -> TaskOutcome {
        let Some(registered) = self.tasks.get(job.task.as_str()) else {
            let failure = TaskFailure::new(
                relayq_core::domain::task::FailureKind::UnknownTask,
                format!("Unknown task: {}", job.task),
            );
            return failed(job, failure);
        };

        let contract = &registered.contract;
        debug!(job_id = %job.id, "Running {} (limit {:?})", contract.name, contract.time_limit);

        let result = match tokio::time::timeout(contract.time_limit, registered.handler.run(&job.args)).await {
            Ok(result) => result,
            Err(_) => Err(TaskFailure::timeout(format!(
                "{} timed out after {}",
                contract.label,
                describe(contract.time_limit)
            ))),
        };

        match result {
            Ok(value) => TaskOutcome::Success { value },
            Err(failure) => failed(job, failure),
        }
    }
}

fn failed(job: &Job, failure: TaskFailure) -> TaskOutcome {
    let traceback = format!(
        "{}: {}\n  in task {} (job {})\n  args: {}",
        failure.kind,
        failure.message,
        job.task,
        job.id,
        serde_json::to_string(&job.args).unwrap_or_default()
    );
    TaskOutcome::Failure {
        failure,
        traceback: Some(traceback),
    }
}

/// "5 hours", "90 minutes", "3 seconds"
fn describe(limit: Duration) -> String {
    let secs = limit.as_secs();
    let (value, unit) = match secs {
        0 => return format!("{} ms", limit.as_millis()),
        s if s % 3600 == 0 => (s / 3600, "hour"),
        s if s % 60 == 0 => (s / 60, "minute"),
        s => (s, "second"),
    };
    if value == 1 {
        format!("1 {unit}")
    } else {
        format!("{value} {unit}s")
    }
}
