//! Task execution outcomes
//!
//! Workers report exactly one outcome per delivered job. Failures keep the
//! worker's message verbatim so producers see the original text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a worker-side failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// A required input file does not exist
    NotFound,
    /// The external tool exited non-zero or did not produce its output
    ExternalToolFailure,
    /// The task exceeded its hard wall-clock limit
    Timeout,
    /// The external tool could not be invoked at all; an operator must install it
    ToolMissing,
    /// The payload did not carry the arguments the task needs
    InvalidArguments,
    /// No task with the requested name is registered on the worker
    UnknownTask,
}

impl FailureKind {
    /// Failures that no amount of redelivery can fix
    pub fn requires_operator(self) -> bool {
        matches!(self, FailureKind::NotFound | FailureKind::ToolMissing)
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::NotFound => "NotFound",
            FailureKind::ExternalToolFailure => "ExternalToolFailure",
            FailureKind::Timeout => "Timeout",
            FailureKind::ToolMissing => "ToolMissing",
            FailureKind::InvalidArguments => "InvalidArguments",
            FailureKind::UnknownTask => "UnknownTask",
        };
        f.write_str(s)
    }
}

/// A failure raised by a task body
///
/// Displays as the bare message so it can be re-raised to the submitter unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl TaskFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }

    pub fn external(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ExternalToolFailure, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn tool_missing(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ToolMissing, message)
    }

    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(FailureKind::InvalidArguments, message)
    }
}

/// What a worker acknowledges once a task body has returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success {
        value: Value,
    },
    Failure {
        failure: TaskFailure,
        traceback: Option<String>,
    },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }
}

impl From<Result<Value, TaskFailure>> for TaskOutcome {
    fn from(result: Result<Value, TaskFailure>) -> Self {
        match result {
            Ok(value) => TaskOutcome::Success { value },
            Err(failure) => TaskOutcome::Failure {
                failure,
                traceback: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_displays_message_verbatim() {
        let failure = TaskFailure::external("Command failed: boom\n");
        assert_eq!(failure.to_string(), "Command failed: boom\n");
    }

    #[test]
    fn test_operator_failures() {
        assert!(FailureKind::ToolMissing.requires_operator());
        assert!(FailureKind::NotFound.requires_operator());
        assert!(!FailureKind::Timeout.requires_operator());
    }

    #[test]
    fn test_outcome_wire_format() {
        let outcome = TaskOutcome::Failure {
            failure: TaskFailure::timeout("Command timed out after 5 hours"),
            traceback: None,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["failure"]["kind"], "Timeout");
    }
}
