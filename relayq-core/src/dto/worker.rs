//! Worker DTOs
//!
//! Data transfer objects for worker registration and delivery.

use serde::{Deserialize, Serialize};

/// Sent by a worker when it connects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRegistration {
    /// Unique, self-reported worker name
    pub name: String,

    /// Advertised host tags (e.g. `mac-mini`); these double as routing keys
    #[serde(default)]
    pub tags: Vec<String>,

    /// Discovered capabilities (e.g. `tool.ffmpeg`)
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Number of concurrent task slots
    pub concurrency: usize,
}

/// Request for the next deliverable job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReserveRequest {
    /// Keyed jobs are only delivered to workers listing the key; pooled jobs go to anyone
    #[serde(default)]
    pub routing_keys: Vec<String>,
}
