//! Episode transcription producer
//!
//! Pulls pending episodes from an [`EpisodeStore`], submits a transcription
//! job for each and writes the outcome back once the job settles.

use relayq_core::domain::episode::{Episode, EpisodeError, EpisodeStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::handle::JobHandle;
use crate::jobs::JobClient;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] EpisodeError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// An episode whose transcription job is in flight
#[derive(Debug, Clone)]
pub struct DispatchedEpisode {
    pub episode: Episode,
    pub handle: JobHandle,
}

/// How a dispatched episode ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Completed,
    Failed(String),
}

pub struct EpisodeDispatcher {
    store: Arc<dyn EpisodeStore>,
    client: JobClient,
    model: Option<String>,
}

impl EpisodeDispatcher {
    pub fn new(store: Arc<dyn EpisodeStore>, client: JobClient) -> Self {
        Self {
            store,
            client,
            model: None,
        }
    }

    /// Whisper model for every submitted job
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Submit transcriptions for up to `limit` pending episodes
    ///
    /// Episodes without a local audio file are skipped. A submission failure
    /// marks that episode failed and stops the batch.
    pub async fn dispatch(
        &self,
        limit: usize,
        filter: Option<&str>,
    ) -> Result<Vec<DispatchedEpisode>, DispatchError> {
        let pending = self.store.get_pending(limit, filter).await?;
        let mut dispatched = Vec::with_capacity(pending.len());

        for episode in pending {
            let Some(audio) = episode.audio_path.clone() else {
                debug!("Episode {} has no local audio yet; skipping", episode.id);
                continue;
            };

            self.store.mark_processing(episode.id).await?;

            let handle = match self.client.transcribe(&audio, self.model.as_deref()).await {
                Ok(handle) => handle,
                Err(e) => {
                    self.store.mark_failed(episode.id, &e.to_string()).await?;
                    return Err(e.into());
                }
            };

            info!(
                job_id = %handle.id(),
                "Dispatched transcription for episode {} ({})",
                episode.id,
                episode.title
            );
            dispatched.push(DispatchedEpisode { episode, handle });
        }

        Ok(dispatched)
    }

    /// Wait for a dispatched episode and record the outcome in the store
    ///
    /// A client-side timeout leaves the episode in processing and is returned
    /// as an error; the job may still finish later.
    pub async fn settle(
        &self,
        dispatched: &DispatchedEpisode,
        timeout: Option<Duration>,
    ) -> Result<Settlement, DispatchError> {
        let id = dispatched.episode.id;

        match dispatched.handle.wait(timeout).await {
            Ok(transcript) => {
                self.store
                    .mark_completed(
                        id,
                        json!({
                            "job_id": dispatched.handle.id(),
                            "transcript": transcript,
                        }),
                    )
                    .await?;
                Ok(Settlement::Completed)
            }
            Err(ClientError::TaskFailed(failure)) => {
                warn!("Transcription for episode {} failed: {}", id, failure);
                self.store.mark_failed(id, &failure.message).await?;
                Ok(Settlement::Failed(failure.message))
            }
            Err(e) => Err(e.into()),
        }
    }
}
