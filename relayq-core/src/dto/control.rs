//! Control-plane DTOs
//!
//! Raw per-worker inspection data as reported by the transport. The status
//! aggregator turns these into `AggregateStatus`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Minimal description of a job held or awaited by a worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub id: Uuid,
    pub task: String,
    pub routing_key: Option<String>,
}

/// Lifetime counters for one worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    /// Acknowledged jobs per task name
    #[serde(default)]
    pub total: BTreeMap<String, u64>,
}

/// Everything the control plane knows about one worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSnapshot {
    #[serde(default)]
    pub active: Vec<TaskDescriptor>,
    #[serde(default)]
    pub scheduled: Vec<TaskDescriptor>,
    /// Absent when the worker has not reported stats yet
    #[serde(default)]
    pub stats: Option<WorkerStats>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Snapshot of the whole fleet, keyed by worker name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlaneSnapshot {
    pub workers: BTreeMap<String, WorkerSnapshot>,
}
