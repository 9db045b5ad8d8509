//! In-memory transport
//!
//! Single-process queue with late acknowledgment. It backs the development
//! broker and stands in for a real broker in tests. Nothing here survives a
//! restart.
//!
//! Delivery rules:
//! - FIFO within the queue; a worker takes the oldest job it is eligible for
//! - reserved jobs stay unacknowledged until the worker acks
//! - when a worker deregisters or is reaped, its unacknowledged jobs go back
//!   to the front of the queue (the job state stays Active)
//! - the first acknowledgment wins; later duplicates are ignored

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use relayq_core::domain::job::{Job, JobSnapshot, JobState};
use relayq_core::domain::task::TaskOutcome;
use relayq_core::dto::control::{ControlPlaneSnapshot, TaskDescriptor, WorkerSnapshot, WorkerStats};
use relayq_core::dto::worker::WorkerRegistration;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::transport::{ControlPlane, Transport, WorkerTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Delivery {
    Queued,
    Reserved { worker: String },
    Consumed { at: DateTime<Utc> },
}

#[derive(Debug)]
struct Entry {
    job: Job,
    snapshot: JobSnapshot,
    delivery: Delivery,
    deliveries: u32,
}

impl Entry {
    fn descriptor(&self) -> TaskDescriptor {
        TaskDescriptor {
            id: self.job.id,
            task: self.job.task.clone(),
            routing_key: self.job.routing_key.clone(),
        }
    }

    fn is_reserved_by(&self, worker: &str) -> bool {
        matches!(&self.delivery, Delivery::Reserved { worker: w } if w == worker)
    }
}

#[derive(Debug)]
struct WorkerState {
    registration: WorkerRegistration,
    last_seen: DateTime<Utc>,
    processed: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
struct State {
    jobs: HashMap<Uuid, Entry>,
    queue: VecDeque<Uuid>,
    idempotency: HashMap<String, Uuid>,
    workers: BTreeMap<String, WorkerState>,
}

impl State {
    /// Puts every job held by `worker` back at the front of the queue
    fn redeliver_from(&mut self, worker: &str) -> usize {
        let mut held: Vec<&mut Entry> = self
            .jobs
            .values_mut()
            .filter(|entry| entry.is_reserved_by(worker))
            .collect();
        held.sort_by_key(|entry| std::cmp::Reverse(entry.job.submitted_at));

        let count = held.len();
        for entry in held {
            entry.delivery = Delivery::Queued;
            self.queue.push_front(entry.job.id);
        }
        count
    }

    fn remove_worker(&mut self, worker: &str) -> bool {
        if self.workers.remove(worker).is_none() {
            return false;
        }
        let redelivered = self.redeliver_from(worker);
        if redelivered > 0 {
            warn!(
                "Worker {} left holding {} unacknowledged job(s); redelivering",
                worker, redelivered
            );
        }
        true
    }
}

/// `now - ttl`, or `None` when the window reaches back before representable time
fn cutoff(ttl: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_sub_signed(ttl))
}

/// Process-local transport implementing every transport trait
#[derive(Debug)]
pub struct MemoryTransport {
    state: Mutex<State>,
    online: AtomicBool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            online: AtomicBool::new(true),
        }
    }

    /// Simulates the transport becoming (un)reachable
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::Unavailable("transport is offline".to_string()))
        }
    }

    /// Number of jobs waiting for delivery
    pub fn queued_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// How many times a job has been handed to a worker
    pub fn delivery_count(&self, id: Uuid) -> Option<u32> {
        self.state.lock().jobs.get(&id).map(|entry| entry.deliveries)
    }

    /// Declares workers silent for longer than `ttl` lost and redelivers their jobs
    pub fn reap_expired_workers(&self, ttl: Duration) -> Vec<String> {
        let Some(cutoff) = cutoff(ttl) else {
            return Vec::new();
        };
        let mut state = self.state.lock();

        let expired: Vec<String> = state
            .workers
            .iter()
            .filter(|(_, worker)| worker.last_seen < cutoff)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &expired {
            info!("Worker {} missed its heartbeat window; declaring it lost", name);
            state.remove_worker(name);
        }
        expired
    }

    /// Drops results acknowledged more than `ttl` ago
    pub fn purge_expired_results(&self, ttl: Duration) -> usize {
        let Some(cutoff) = cutoff(ttl) else {
            return 0;
        };
        let mut state = self.state.lock();

        let before = state.jobs.len();
        state
            .jobs
            .retain(|_, entry| !matches!(entry.delivery, Delivery::Consumed { at } if at < cutoff));
        let purged = before - state.jobs.len();

        if purged > 0 {
            let State {
                jobs, idempotency, ..
            } = &mut *state;
            idempotency.retain(|_, id| jobs.contains_key(id));
            debug!("Purged {} expired result(s)", purged);
        }
        purged
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, job: Job) -> Result<Uuid> {
        self.ensure_online()?;
        let mut state = self.state.lock();

        if let Some(key) = &job.idempotency_key {
            if let Some(existing) = state.idempotency.get(key) {
                debug!("Idempotency key {} already maps to job {}", key, existing);
                return Ok(*existing);
            }
        }

        let id = job.id;
        if state.jobs.contains_key(&id) {
            return Err(ClientError::InvalidRequest(format!(
                "Job {} already exists",
                id
            )));
        }

        if let Some(key) = &job.idempotency_key {
            state.idempotency.insert(key.clone(), id);
        }

        let snapshot = JobSnapshot::pending(&job);
        state.jobs.insert(
            id,
            Entry {
                job,
                snapshot,
                delivery: Delivery::Queued,
                deliveries: 0,
            },
        );
        state.queue.push_back(id);

        Ok(id)
    }

    async fn snapshot(&self, id: Uuid) -> Result<JobSnapshot> {
        self.ensure_online()?;
        self.state
            .lock()
            .jobs
            .get(&id)
            .map(|entry| entry.snapshot.clone())
            .ok_or_else(|| ClientError::NotFound(format!("Job {} not found", id)))
    }
}

#[async_trait]
impl WorkerTransport for MemoryTransport {
    async fn register_worker(&self, registration: WorkerRegistration) -> Result<()> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        let now = Utc::now();

        // Re-registering under a live name keeps the lifetime counters
        let processed = state
            .workers
            .remove(&registration.name)
            .map(|previous| previous.processed)
            .unwrap_or_default();

        info!(
            "Registered worker {} (tags: {:?}, concurrency: {})",
            registration.name, registration.tags, registration.concurrency
        );

        state.workers.insert(
            registration.name.clone(),
            WorkerState {
                registration,
                last_seen: now,
                processed,
            },
        );
        Ok(())
    }

    async fn heartbeat(&self, worker: &str) -> Result<()> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        let entry = state
            .workers
            .get_mut(worker)
            .ok_or_else(|| ClientError::NotFound(format!("Worker {} not registered", worker)))?;
        entry.last_seen = Utc::now();
        Ok(())
    }

    async fn reserve(&self, worker: &str, routing_keys: &[String]) -> Result<Option<Job>> {
        self.ensure_online()?;
        let mut state = self.state.lock();

        let registered = state
            .workers
            .get_mut(worker)
            .ok_or_else(|| ClientError::NotFound(format!("Worker {} not registered", worker)))?;
        registered.last_seen = Utc::now();

        let State { jobs, queue, .. } = &mut *state;
        let position = queue.iter().position(|id| {
            jobs.get(id).is_some_and(|entry| match &entry.job.routing_key {
                None => true,
                Some(key) => routing_keys.iter().any(|k| k == key),
            })
        });

        let Some(position) = position else {
            return Ok(None);
        };
        let Some(id) = queue.remove(position) else {
            return Ok(None);
        };
        let Some(entry) = jobs.get_mut(&id) else {
            return Ok(None);
        };

        entry.delivery = Delivery::Reserved {
            worker: worker.to_string(),
        };
        entry.deliveries += 1;
        if entry.snapshot.state == JobState::Pending {
            entry.snapshot.state = JobState::Active;
        }
        entry.snapshot.worker = Some(worker.to_string());

        if entry.deliveries > 1 {
            info!(
                "Redelivering job {} to {} (delivery #{})",
                id, worker, entry.deliveries
            );
        }

        Ok(Some(entry.job.clone()))
    }

    async fn report_progress(&self, id: Uuid, worker: &str, info: Value) -> Result<()> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        let entry = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(format!("Job {} not found", id)))?;

        if !entry.is_reserved_by(worker) {
            return Err(ClientError::InvalidRequest(format!(
                "Job {} is not held by {}",
                id, worker
            )));
        }

        entry.snapshot.info = Some(info);
        Ok(())
    }

    async fn acknowledge(&self, id: Uuid, worker: &str, outcome: TaskOutcome) -> Result<()> {
        self.ensure_online()?;
        let mut state = self.state.lock();
        let State {
            jobs,
            queue,
            workers,
            ..
        } = &mut *state;

        let entry = jobs
            .get_mut(&id)
            .ok_or_else(|| ClientError::NotFound(format!("Job {} not found", id)))?;

        if entry.snapshot.state.is_terminal() {
            debug!(
                "Ignoring duplicate acknowledgment for job {} from {}",
                id, worker
            );
            return Ok(());
        }

        if entry.delivery == Delivery::Queued {
            // A worker declared lost finished after all
            queue.retain(|queued| *queued != id);
        }

        let next = if outcome.is_success() {
            JobState::Success
        } else {
            JobState::Failure
        };
        if !entry.snapshot.state.can_advance_to(next) {
            return Err(ClientError::InternalError(format!(
                "Job {} cannot move from {} to {}",
                id, entry.snapshot.state, next
            )));
        }

        match outcome {
            TaskOutcome::Success { value } => {
                entry.snapshot.result = Some(value);
            }
            TaskOutcome::Failure { failure, traceback } => {
                entry.snapshot.error = Some(failure);
                entry.snapshot.traceback = traceback;
            }
        }
        entry.snapshot.state = next;
        entry.snapshot.worker = Some(worker.to_string());
        entry.delivery = Delivery::Consumed { at: Utc::now() };

        if let Some(registered) = workers.get_mut(worker) {
            *registered
                .processed
                .entry(entry.job.task.clone())
                .or_insert(0) += 1;
        }

        Ok(())
    }

    async fn deregister_worker(&self, worker: &str) -> Result<()> {
        self.ensure_online()?;
        if self.state.lock().remove_worker(worker) {
            info!("Worker {} deregistered", worker);
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for MemoryTransport {
    async fn inspect(&self) -> Result<ControlPlaneSnapshot> {
        self.ensure_online()?;
        let state = self.state.lock();

        let workers = state
            .workers
            .iter()
            .map(|(name, worker)| {
                let mut held: Vec<&Entry> = state
                    .jobs
                    .values()
                    .filter(|entry| entry.is_reserved_by(name))
                    .collect();
                held.sort_by_key(|entry| entry.job.submitted_at);

                let scheduled = state
                    .queue
                    .iter()
                    .filter_map(|id| state.jobs.get(id))
                    .filter(|entry| {
                        entry
                            .job
                            .routing_key
                            .as_ref()
                            .is_some_and(|key| worker.registration.tags.contains(key))
                    })
                    .map(Entry::descriptor)
                    .collect();

                let snapshot = WorkerSnapshot {
                    active: held.into_iter().map(Entry::descriptor).collect(),
                    scheduled,
                    stats: Some(WorkerStats {
                        total: worker.processed.clone(),
                    }),
                    tags: worker.registration.tags.clone(),
                };
                (name.clone(), snapshot)
            })
            .collect();

        Ok(ControlPlaneSnapshot { workers })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayq_core::domain::job::TaskArgs;
    use relayq_core::domain::task::TaskFailure;
    use serde_json::json;

    fn job(task: &str, routing_key: Option<&str>) -> Job {
        Job::new(task, TaskArgs::new(), routing_key.map(str::to_string))
    }

    async fn worker(transport: &MemoryTransport, name: &str, tags: &[&str]) {
        transport
            .register_worker(WorkerRegistration {
                name: name.to_string(),
                tags: tags.iter().map(|t| t.to_string()).collect(),
                capabilities: vec![],
                concurrency: 2,
            })
            .await
            .unwrap();
    }

    fn keys(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_publish_then_snapshot_is_pending() {
        let transport = MemoryTransport::new();
        let id = transport.publish(job("relayq.run_command", None)).await.unwrap();

        let snapshot = transport.snapshot(id).await.unwrap();
        assert_eq!(snapshot.state, JobState::Pending);
        assert_eq!(transport.queued_len(), 1);
    }

    #[tokio::test]
    async fn test_routing_key_steers_delivery() {
        let transport = MemoryTransport::new();
        worker(&transport, "rpi4-a", &["rpi4"]).await;
        worker(&transport, "macmini-a", &["mac-mini"]).await;

        let keyed = transport
            .publish(job("relayq.run_command", Some("mac-mini")))
            .await
            .unwrap();

        let none = transport.reserve("rpi4-a", &keys(&["rpi4"])).await.unwrap();
        assert!(none.is_none());

        let got = transport
            .reserve("macmini-a", &keys(&["mac-mini"]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.id, keyed);
        assert_eq!(transport.snapshot(keyed).await.unwrap().state, JobState::Active);
    }

    #[tokio::test]
    async fn test_fifo_within_queue() {
        let transport = MemoryTransport::new();
        worker(&transport, "w", &[]).await;

        let first = transport.publish(job("a", None)).await.unwrap();
        let second = transport.publish(job("b", None)).await.unwrap();

        let a = transport.reserve("w", &[]).await.unwrap().unwrap();
        let b = transport.reserve("w", &[]).await.unwrap().unwrap();
        assert_eq!((a.id, b.id), (first, second));
    }

    #[tokio::test]
    async fn test_ack_records_terminal_outcome_once() {
        let transport = MemoryTransport::new();
        worker(&transport, "w", &[]).await;
        let id = transport.publish(job("relayq.run_command", None)).await.unwrap();
        transport.reserve("w", &[]).await.unwrap();

        transport
            .acknowledge(id, "w", TaskOutcome::Success { value: json!("out") })
            .await
            .unwrap();
        transport
            .acknowledge(
                id,
                "w",
                TaskOutcome::Failure {
                    failure: TaskFailure::external("late duplicate"),
                    traceback: None,
                },
            )
            .await
            .unwrap();

        let snapshot = transport.snapshot(id).await.unwrap();
        assert_eq!(snapshot.state, JobState::Success);
        assert_eq!(snapshot.result, Some(json!("out")));
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_lost_worker_jobs_are_redelivered() {
        let transport = MemoryTransport::new();
        worker(&transport, "a", &[]).await;
        worker(&transport, "b", &[]).await;
        let id = transport.publish(job("relayq.transcode_video", None)).await.unwrap();

        transport.reserve("a", &[]).await.unwrap().unwrap();
        transport.deregister_worker("a").await.unwrap();

        // Still Active from the producer's point of view
        assert_eq!(transport.snapshot(id).await.unwrap().state, JobState::Active);

        let again = transport.reserve("b", &[]).await.unwrap().unwrap();
        assert_eq!(again.id, id);
        assert_eq!(transport.delivery_count(id), Some(2));
    }

    #[tokio::test]
    async fn test_reap_expired_workers() {
        let transport = MemoryTransport::new();
        worker(&transport, "quiet", &[]).await;
        let id = transport.publish(job("a", None)).await.unwrap();
        transport.reserve("quiet", &[]).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let reaped = transport.reap_expired_workers(Duration::from_millis(1));

        assert_eq!(reaped, vec!["quiet".to_string()]);
        assert_eq!(transport.queued_len(), 1);
        assert_eq!(transport.snapshot(id).await.unwrap().state, JobState::Active);
    }

    #[tokio::test]
    async fn test_idempotency_key_deduplicates() {
        let transport = MemoryTransport::new();
        let first = transport
            .publish(job("a", None).with_idempotency_key("video-42"))
            .await
            .unwrap();
        let second = transport
            .publish(job("a", None).with_idempotency_key("video-42"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.queued_len(), 1);
    }

    #[tokio::test]
    async fn test_inspect_reports_active_scheduled_and_totals() {
        let transport = MemoryTransport::new();
        worker(&transport, "macmini-01", &["mac-mini"]).await;

        let running = transport
            .publish(job("relayq.run_command", Some("mac-mini")))
            .await
            .unwrap();
        transport.publish(job("relayq.run_command", Some("mac-mini"))).await.unwrap();
        transport.publish(job("relayq.run_command", None)).await.unwrap();

        transport
            .reserve("macmini-01", &keys(&["mac-mini"]))
            .await
            .unwrap();

        let snapshot = transport.inspect().await.unwrap();
        let mac = &snapshot.workers["macmini-01"];
        assert_eq!(mac.active.len(), 1);
        assert_eq!(mac.active[0].id, running);
        // The pooled job is not attributed to any worker
        assert_eq!(mac.scheduled.len(), 1);

        transport
            .acknowledge(running, "macmini-01", TaskOutcome::Success { value: json!(null) })
            .await
            .unwrap();
        let snapshot = transport.inspect().await.unwrap();
        let stats = snapshot.workers["macmini-01"].stats.clone().unwrap();
        assert_eq!(stats.total.get("relayq.run_command"), Some(&1));
    }

    #[tokio::test]
    async fn test_offline_transport_is_unavailable() {
        let transport = MemoryTransport::new();
        transport.set_online(false);

        let err = transport.publish(job("a", None)).await.unwrap_err();
        assert!(matches!(err, ClientError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_unregistered_worker_cannot_reserve() {
        let transport = MemoryTransport::new();
        let err = transport.reserve("ghost", &[]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_purge_expired_results() {
        let transport = MemoryTransport::new();
        worker(&transport, "w", &[]).await;
        let id = transport
            .publish(job("a", None).with_idempotency_key("k"))
            .await
            .unwrap();
        transport.reserve("w", &[]).await.unwrap();
        transport
            .acknowledge(id, "w", TaskOutcome::Success { value: json!(1) })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(transport.purge_expired_results(Duration::from_millis(1)), 1);
        assert!(transport.snapshot(id).await.unwrap_err().is_not_found());
    }
}
