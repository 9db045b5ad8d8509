//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::task::TaskFailure;

/// A unit of work as it travels through the transport
///
/// The id is assigned at submission time and is the handle producers use
/// to query the job afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    /// Registered task name, e.g. `relayq.run_command`
    pub task: String,
    pub args: TaskArgs,
    /// Steers delivery to workers advertising this key; `None` means any worker
    pub routing_key: Option<String>,
    /// Duplicate publishes with the same key resolve to the first job
    #[serde(default)]
    pub idempotency_key: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl Job {
    pub fn new(task: impl Into<String>, args: TaskArgs, routing_key: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task: task.into(),
            args,
            routing_key,
            idempotency_key: None,
            submitted_at: Utc::now(),
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Positional and keyword arguments for a task body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskArgs {
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl TaskArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Looks up an argument by position first, then by keyword
    pub fn get(&self, position: usize, name: &str) -> Option<&Value> {
        self.args
            .get(position)
            .or_else(|| self.kwargs.get(name))
            .filter(|v| !v.is_null())
    }

    /// String argument by position or keyword; null and missing are `None`
    pub fn get_str(&self, position: usize, name: &str) -> Option<&str> {
        self.get(position, name).and_then(Value::as_str)
    }
}

/// Lifecycle state of a submitted job
///
/// Transitions only ever move forward: Pending → Active → Success | Failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Active,
    Success,
    Failure,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Success | JobState::Failure)
    }

    /// Whether moving from `self` to `next` respects the one-directional lifecycle
    pub fn can_advance_to(self, next: JobState) -> bool {
        match self {
            JobState::Pending => next != JobState::Pending,
            JobState::Active => next.is_terminal(),
            JobState::Success | JobState::Failure => false,
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Pending => write!(f, "Pending"),
            JobState::Active => write!(f, "Active"),
            JobState::Success => write!(f, "Success"),
            JobState::Failure => write!(f, "Failure"),
        }
    }
}

/// Point-in-time view of a job as reported by the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub task: String,
    pub state: JobState,
    /// Worker-supplied value, present once the job succeeded
    pub result: Option<Value>,
    /// Worker-supplied failure, present once the job failed
    pub error: Option<TaskFailure>,
    /// In-flight progress metadata, if the worker reported any
    pub info: Option<Value>,
    /// Failure diagnostics, if the worker captured any
    pub traceback: Option<String>,
    /// Worker currently (or last) holding the job
    pub worker: Option<String>,
}

impl JobSnapshot {
    /// A freshly enqueued job nobody has picked up yet
    pub fn pending(job: &Job) -> Self {
        Self {
            id: job.id,
            task: job.task.clone(),
            state: JobState::Pending,
            result: None,
            error: None,
            info: None,
            traceback: None,
            worker: None,
        }
    }
}

/// Well-known task names served by RelayQ workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    RunCommand,
    TranscodeVideo,
    TranscribeAudio,
}

impl TaskKind {
    pub const ALL: [TaskKind; 3] = [
        TaskKind::RunCommand,
        TaskKind::TranscodeVideo,
        TaskKind::TranscribeAudio,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TaskKind::RunCommand => "relayq.run_command",
            TaskKind::TranscodeVideo => "relayq.transcode_video",
            TaskKind::TranscribeAudio => "relayq.transcribe_audio",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
