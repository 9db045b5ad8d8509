//! Transport abstraction
//!
//! The message transport is an external collaborator. These traits are the
//! only surface the rest of RelayQ touches, split by who uses it:
//! - [`Transport`]: producers publish jobs and read their state
//! - [`WorkerTransport`]: workers register, reserve, report and acknowledge
//! - [`ControlPlane`]: read-only fleet inspection
//!
//! Clients are constructed explicitly and injected; there is no global handle.

mod http;
mod memory;

pub use http::HttpTransport;
pub use memory::MemoryTransport;

use async_trait::async_trait;
use relayq_core::domain::job::{Job, JobSnapshot};
use relayq_core::domain::task::TaskOutcome;
use relayq_core::dto::control::ControlPlaneSnapshot;
use relayq_core::dto::worker::WorkerRegistration;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;

/// Producer-side transport surface
#[async_trait]
pub trait Transport: Send + Sync {
    /// Enqueues a job and returns the id to track
    ///
    /// When the job carries an idempotency key already seen by the transport,
    /// the earlier job's id is returned and nothing new is enqueued.
    async fn publish(&self, job: Job) -> Result<Uuid>;

    /// Current state of a job
    async fn snapshot(&self, id: Uuid) -> Result<JobSnapshot>;
}

/// Worker-side transport surface
#[async_trait]
pub trait WorkerTransport: Send + Sync {
    /// Announces a worker and the tags/capabilities it serves
    async fn register_worker(&self, registration: WorkerRegistration) -> Result<()>;

    /// Keeps a worker alive; silent workers are declared lost and their jobs redelivered
    async fn heartbeat(&self, worker: &str) -> Result<()>;

    /// Takes the next deliverable job, marking it Active
    ///
    /// Jobs with a routing key are delivered only to callers listing that key.
    /// The job stays unacknowledged until [`WorkerTransport::acknowledge`].
    async fn reserve(&self, worker: &str, routing_keys: &[String]) -> Result<Option<Job>>;

    /// Attaches progress metadata to an in-flight job
    async fn report_progress(&self, id: Uuid, worker: &str, info: Value) -> Result<()>;

    /// Late acknowledgment: records the terminal outcome and consumes the delivery
    async fn acknowledge(&self, id: Uuid, worker: &str, outcome: TaskOutcome) -> Result<()>;

    /// Removes a worker; anything it still holds is redelivered
    async fn deregister_worker(&self, worker: &str) -> Result<()>;
}

/// Control-plane query surface
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Live per-worker snapshot of active, scheduled and lifetime counts
    async fn inspect(&self) -> Result<ControlPlaneSnapshot>;
}
