//! Job submission
//!
//! `JobClient` packages typed arguments for the known task contracts and hands
//! them to the injected transport. Nothing here blocks; waiting happens on the
//! returned [`JobHandle`].

use relayq_core::Destination;
use relayq_core::domain::job::{Job, TaskArgs, TaskKind};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::handle::JobHandle;
use crate::transport::Transport;

/// Default interval between snapshot reads while waiting on a handle
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Whisper model used when the caller does not pick one
pub const DEFAULT_WHISPER_MODEL: &str = "base";

/// Suffix appended to the input stem when no transcode output is given
const TRANSCODED_SUFFIX: &str = "_transcoded.mp4";

/// Submits jobs through an explicitly injected transport
#[derive(Clone)]
pub struct JobClient {
    transport: Arc<dyn Transport>,
    poll_interval: Duration,
}

impl std::fmt::Debug for JobClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobClient")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

impl JobClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Poll interval handed to every handle this client creates
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Reattach to a job submitted earlier (e.g. by another process)
    pub fn handle(&self, id: Uuid) -> JobHandle {
        JobHandle::new(id, self.transport.clone(), self.poll_interval)
    }

    /// Enqueue a task by name
    ///
    /// `routing_key` restricts delivery to workers advertising that key.
    pub async fn submit(
        &self,
        task: &str,
        args: TaskArgs,
        routing_key: Option<&str>,
    ) -> Result<JobHandle> {
        self.submit_job(Job::new(task, args, routing_key.map(str::to_string)))
            .await
    }

    /// Enqueue a fully built job, e.g. one carrying an idempotency key
    pub async fn submit_job(&self, job: Job) -> Result<JobHandle> {
        let task = job.task.clone();
        let routing_key = job.routing_key.clone();

        let id = self.transport.publish(job).await?;
        debug!(
            job_id = %id,
            routing_key = routing_key.as_deref().unwrap_or("pooled"),
            "Submitted {}",
            task
        );

        Ok(self.handle(id))
    }

    /// Enqueue a task for a destination picked by the selector
    pub async fn submit_to(
        &self,
        destination: Destination,
        task: &str,
        args: TaskArgs,
    ) -> Result<JobHandle> {
        self.submit(task, args, destination.routing_key()).await
    }

    /// Run a shell command, optionally pinned to a worker routing key
    pub async fn run(
        &self,
        command: &str,
        cwd: Option<&str>,
        worker: Option<&str>,
    ) -> Result<JobHandle> {
        let mut args = TaskArgs::new().arg(command);
        if let Some(cwd) = cwd {
            args = args.kwarg("cwd", cwd);
        }
        self.submit(TaskKind::RunCommand.name(), args, worker).await
    }

    pub async fn run_on_mac(&self, command: &str, cwd: Option<&str>) -> Result<JobHandle> {
        self.run(command, cwd, Destination::Mac.routing_key()).await
    }

    pub async fn run_on_rpi(&self, command: &str, cwd: Option<&str>) -> Result<JobHandle> {
        self.run(command, cwd, Destination::Rpi.routing_key()).await
    }

    /// Transcode a video on the mac destination
    ///
    /// Without `output` the result lands next to the input as `<stem>_transcoded.mp4`.
    pub async fn transcode(
        &self,
        input: &str,
        output: Option<&str>,
        options: Option<&str>,
    ) -> Result<JobHandle> {
        let output = output
            .map(str::to_string)
            .unwrap_or_else(|| default_transcode_output(input));

        let mut args = TaskArgs::new().arg(input).arg(output);
        if let Some(options) = options {
            args = args.kwarg("options", options);
        }
        self.submit(
            TaskKind::TranscodeVideo.name(),
            args,
            Destination::Mac.routing_key(),
        )
        .await
    }

    /// Transcribe an audio file on the mac destination
    pub async fn transcribe(&self, audio: &str, model: Option<&str>) -> Result<JobHandle> {
        let args = TaskArgs::new()
            .arg(audio)
            .kwarg("model", model.unwrap_or(DEFAULT_WHISPER_MODEL));
        self.submit(
            TaskKind::TranscribeAudio.name(),
            args,
            Destination::Mac.routing_key(),
        )
        .await
    }
}

/// `<dir>/<stem>_transcoded.mp4` for a given input path
pub fn default_transcode_output(input: &str) -> String {
    let path = Path::new(input);
    match path.file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) if !stem.is_empty() => path
            .with_file_name(format!("{stem}{TRANSCODED_SUFFIX}"))
            .to_string_lossy()
            .into_owned(),
        _ => format!("{input}{TRANSCODED_SUFFIX}"),
    }
}
