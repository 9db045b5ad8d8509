//! Episode-store collaborator
//!
//! Job producers may pull work from an external episode-tracking store and
//! report results back to it. Only the contract lives here; concrete stores
//! are provided by whoever owns the data.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An episode awaiting (or undergoing) processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub title: String,
    pub podcast_name: Option<String>,
    /// Remote location of the audio
    pub audio_url: Option<String>,
    /// Local copy of the audio, when one has been downloaded
    pub audio_path: Option<String>,
}

/// Counters reported by the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub total_podcasts: u64,
    pub total_episodes: u64,
    pub pending_episodes: u64,
    pub processing_episodes: u64,
    pub completed_episodes: u64,
    pub failed_episodes: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum EpisodeError {
    #[error("episode {0} not found")]
    NotFound(i64),

    #[error("episode store unavailable: {0}")]
    Unavailable(String),
}

/// CRUD surface of the episode store
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    /// Pending episodes, optionally filtered by podcast name substring
    async fn get_pending(
        &self,
        limit: usize,
        filter: Option<&str>,
    ) -> Result<Vec<Episode>, EpisodeError>;

    async fn mark_processing(&self, id: i64) -> Result<(), EpisodeError>;

    async fn mark_completed(&self, id: i64, payload: Value) -> Result<(), EpisodeError>;

    async fn mark_failed(&self, id: i64, error: &str) -> Result<(), EpisodeError>;

    async fn get_stats(&self) -> Result<EpisodeStats, EpisodeError>;
}
