//! Job poller
//!
//! Reserves jobs from the broker while task slots are free and runs each one
//! in its own tokio task. A job is acknowledged only after its body returns,
//! so losing this process mid-task makes the broker hand the job to another
//! worker.

use anyhow::Result;
use chrono::Utc;
use relayq_client::WorkerTransport;
use relayq_core::domain::job::Job;
use relayq_core::domain::task::TaskOutcome;
use relayq_core::dto::worker::WorkerRegistration;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::scheduler::registration::register_with_retry;
use crate::tasks::TaskRegistry;

const ACK_ATTEMPTS: u32 = 3;

/// Why the poller stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    /// The task budget for this process is spent; start a fresh one
    Recycle,
    /// Asked to stop
    Shutdown,
}

/// Job poller that continuously reserves and executes jobs
pub struct JobPoller {
    config: Config,
    transport: Arc<dyn WorkerTransport>,
    registry: Arc<TaskRegistry>,
    registration: WorkerRegistration,
    semaphore: Arc<Semaphore>,
    completed: Arc<AtomicUsize>,
}

impl JobPoller {
    pub fn new(
        config: Config,
        transport: Arc<dyn WorkerTransport>,
        registry: Arc<TaskRegistry>,
        registration: WorkerRegistration,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.concurrency));
        Self {
            config,
            transport,
            registry,
            registration,
            semaphore,
            completed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Tasks finished (and acknowledged) by this process
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Polls until the task budget is spent or `shutdown` resolves
    ///
    /// On recycle, in-flight tasks are drained and acknowledged first. On
    /// shutdown they are abandoned; deregistering hands them back to the
    /// broker for redelivery.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<PollerExit> {
        info!(
            "Starting job poller (interval: {:?}, slots: {}, recycle after: {})",
            self.config.poll_interval, self.config.concurrency, self.config.max_tasks_per_child
        );

        let heartbeat = self.start_heartbeat_loop();
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        let exit = loop {
            if self.budget_spent(0) {
                info!(
                    "Completed {} task(s); recycling worker process",
                    self.completed()
                );
                break PollerExit::Recycle;
            }

            tokio::select! {
                _ = &mut shutdown => break PollerExit::Shutdown,
                _ = interval.tick() => {}
            }

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    warn!("Job task panicked: {}", e);
                }
            }

            match self.fill_slots(&mut tasks).await {
                Ok(started) if started > 0 => debug!("Started {} job(s) this cycle", started),
                Ok(_) => {}
                Err(e) => error!("Error during poll cycle: {:#}", e),
            }
        };

        match exit {
            PollerExit::Recycle => {
                while let Some(joined) = tasks.join_next().await {
                    if let Err(e) = joined {
                        warn!("Job task panicked: {}", e);
                    }
                }
            }
            PollerExit::Shutdown => {
                if !tasks.is_empty() {
                    warn!(
                        "Abandoning {} in-flight job(s); the broker will redeliver them",
                        tasks.len()
                    );
                }
                tasks.shutdown().await;
            }
        }

        heartbeat.abort();

        if let Err(e) = self
            .transport
            .deregister_worker(&self.registration.name)
            .await
        {
            warn!("Failed to deregister from broker: {}", e);
        }

        Ok(exit)
    }

    /// Whether this process has (or will have) run its full quota of tasks
    fn budget_spent(&self, in_flight: usize) -> bool {
        self.completed() + in_flight >= self.config.max_tasks_per_child
    }

    /// Reserves one job per free slot; never holds more jobs than slots
    async fn fill_slots(&self, tasks: &mut JoinSet<()>) -> Result<usize> {
        let mut started = 0;

        loop {
            if self.budget_spent(tasks.len()) {
                break;
            }

            let Ok(permit) = self.semaphore.clone().try_acquire_owned() else {
                debug!("All {} slot(s) busy", self.config.concurrency);
                break;
            };

            match self
                .transport
                .reserve(&self.registration.name, &self.registration.tags)
                .await
            {
                Ok(Some(job)) => {
                    tasks.spawn(Self::execute_job(
                        job,
                        self.registration.name.clone(),
                        Arc::clone(&self.transport),
                        Arc::clone(&self.registry),
                        Arc::clone(&self.completed),
                        permit,
                    ));
                    started += 1;
                }
                Ok(None) => break,
                Err(e) if e.is_not_found() => {
                    warn!("Broker no longer knows this worker; registering again");
                    register_with_retry(self.transport.as_ref(), &self.registration).await?;
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(started)
    }

    /// Runs one job and acknowledges its outcome
    async fn execute_job(
        job: Job,
        worker: String,
        transport: Arc<dyn WorkerTransport>,
        registry: Arc<TaskRegistry>,
        completed: Arc<AtomicUsize>,
        _permit: OwnedSemaphorePermit,
    ) {
        let job_id = job.id;
        info!(job_id = %job_id, "Starting {}", job.task);

        let progress = json!({
            "worker": worker,
            "task": job.task,
            "started_at": Utc::now(),
        });
        if let Err(e) = transport.report_progress(job_id, &worker, progress).await {
            warn!(job_id = %job_id, "Failed to report progress: {}", e);
        }

        let outcome = registry.execute(&job).await;
        match &outcome {
            TaskOutcome::Success { .. } => info!(job_id = %job_id, "{} succeeded", job.task),
            TaskOutcome::Failure { failure, .. } if failure.kind.requires_operator() => {
                error!(job_id = %job_id, "{} failed ({}): {}", job.task, failure.kind, failure)
            }
            TaskOutcome::Failure { failure, .. } => {
                warn!(job_id = %job_id, "{} failed ({}): {}", job.task, failure.kind, failure)
            }
        }

        Self::acknowledge(transport.as_ref(), &job, &worker, outcome).await;
        completed.fetch_add(1, Ordering::SeqCst);
        // Permit is released when dropped
    }

    async fn acknowledge(
        transport: &dyn WorkerTransport,
        job: &Job,
        worker: &str,
        outcome: TaskOutcome,
    ) {
        let mut delay = Duration::from_millis(500);

        for attempt in 1..=ACK_ATTEMPTS {
            match transport.acknowledge(job.id, worker, outcome.clone()).await {
                Ok(()) => return,
                Err(e) if attempt == ACK_ATTEMPTS => {
                    error!(
                        job_id = %job.id,
                        "Giving up acknowledging after {} attempts: {}",
                        ACK_ATTEMPTS, e
                    );
                }
                Err(e) => {
                    warn!(job_id = %job.id, "Acknowledgment failed (attempt {}): {}", attempt, e);
                    time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    /// Starts a background task to send heartbeats
    ///
    /// A worker the broker has already reaped registers again.
    fn start_heartbeat_loop(&self) -> tokio::task::JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let registration = self.registration.clone();
        let heartbeat_interval = self.config.heartbeat_interval;

        tokio::spawn(async move {
            let mut ticker = time::interval(heartbeat_interval);

            loop {
                ticker.tick().await;

                debug!("Sending heartbeat");

                match transport.heartbeat(&registration.name).await {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        warn!("Broker reaped this worker; registering again");
                        if let Err(e) = register_with_retry(transport.as_ref(), &registration).await {
                            error!("Re-registration failed: {:#}", e);
                        }
                    }
                    Err(e) => warn!("Failed to send heartbeat: {}", e),
                }
            }
        })
    }
}
