//! Job handles
//!
//! A handle wraps the transport's view of one submitted job. State only moves
//! forward: once a handle has seen a terminal state it stops asking the
//! transport and every later read returns the same value.

use parking_lot::Mutex;
use relayq_core::domain::job::{JobSnapshot, JobState};
use relayq_core::domain::task::TaskFailure;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::transport::Transport;

/// Handle to a submitted job
///
/// Cloning is cheap; clones share the observed state.
#[derive(Clone)]
pub struct JobHandle {
    id: Uuid,
    transport: Arc<dyn Transport>,
    poll_interval: Duration,
    observed: Arc<Mutex<Option<JobSnapshot>>>,
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl JobHandle {
    pub(crate) fn new(id: Uuid, transport: Arc<dyn Transport>, poll_interval: Duration) -> Self {
        Self {
            id,
            transport,
            poll_interval,
            observed: Arc::new(Mutex::new(None)),
        }
    }

    /// Transport-assigned job id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Latest snapshot, fetching from the transport unless already terminal
    pub async fn snapshot(&self) -> Result<JobSnapshot> {
        if let Some(done) = self.terminal() {
            return Ok(done);
        }

        let fresh = self.transport.snapshot(self.id).await?;
        Ok(self.observe(fresh))
    }

    fn terminal(&self) -> Option<JobSnapshot> {
        self.observed
            .lock()
            .as_ref()
            .filter(|snapshot| snapshot.state.is_terminal())
            .cloned()
    }

    /// Records a fresh snapshot unless it would move the job backwards
    fn observe(&self, fresh: JobSnapshot) -> JobSnapshot {
        let mut observed = self.observed.lock();

        let accept = match observed.as_ref() {
            None => true,
            Some(previous) if previous.state == fresh.state => !previous.state.is_terminal(),
            Some(previous) => previous.state.can_advance_to(fresh.state),
        };

        if accept {
            *observed = Some(fresh.clone());
            return fresh;
        }

        // `accept` is only false once something has been observed
        let previous = observed.clone().unwrap_or(fresh);
        if !previous.state.is_terminal() {
            warn!(
                "Transport reported job {} moving backwards to a state before {}; keeping {}",
                self.id, previous.state, previous.state
            );
        }
        previous
    }

    /// Current state
    pub async fn state(&self) -> Result<JobState> {
        Ok(self.snapshot().await?.state)
    }

    /// Whether the job has finished, successfully or not
    pub async fn ready(&self) -> Result<bool> {
        Ok(self.state().await?.is_terminal())
    }

    /// Whether the job finished in Failure
    pub async fn failed(&self) -> Result<bool> {
        Ok(self.state().await? == JobState::Failure)
    }

    /// Waits for a terminal state and returns the worker's value
    ///
    /// A timeout only abandons the local wait; the job keeps running remotely.
    /// A failed job surfaces as [`ClientError::TaskFailed`] with the worker's
    /// message unchanged.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<Value> {
        match timeout {
            None => self.wait_terminal().await,
            Some(limit) => tokio::time::timeout(limit, self.wait_terminal())
                .await
                .map_err(|_| ClientError::ClientTimeout {
                    job_id: self.id,
                    waited: limit,
                })?,
        }
    }

    /// Alias of [`JobHandle::wait`]
    pub async fn get(&self, timeout: Option<Duration>) -> Result<Value> {
        self.wait(timeout).await
    }

    async fn wait_terminal(&self) -> Result<Value> {
        loop {
            let snapshot = self.snapshot().await?;
            match snapshot.state {
                JobState::Success => return Ok(snapshot.result.unwrap_or(Value::Null)),
                JobState::Failure => {
                    return Err(ClientError::TaskFailed(snapshot.error.unwrap_or_else(|| {
                        TaskFailure::external(format!("job {} failed without a message", self.id))
                    })));
                }
                JobState::Pending | JobState::Active => {
                    debug!("Job {} is {}; polling again", self.id, snapshot.state);
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// In-flight progress metadata, if the transport carries any
    pub async fn info(&self) -> Result<Option<Value>> {
        Ok(self.snapshot().await?.info)
    }

    /// Failure diagnostics, if the worker captured any
    pub async fn traceback(&self) -> Result<Option<String>> {
        Ok(self.snapshot().await?.traceback)
    }
}
