//! Task DTOs

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::task::TaskOutcome;

/// Response to a publish: the id producers should track
///
/// Differs from the submitted job's id when an idempotency key matched an
/// earlier submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishResponse {
    pub id: Uuid,
}

/// In-flight progress report from the worker holding a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRequest {
    pub worker: String,
    pub info: Value,
}

/// Late acknowledgment sent once the task body has returned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckRequest {
    pub worker: String,
    pub outcome: TaskOutcome,
}
