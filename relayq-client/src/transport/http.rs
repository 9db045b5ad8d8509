//! HTTP transport
//!
//! Speaks the broker's JSON API. One instance can be shared by producers,
//! workers and the status aggregator.

use async_trait::async_trait;
use relayq_core::domain::job::{Job, JobSnapshot};
use relayq_core::domain::task::TaskOutcome;
use relayq_core::dto::control::ControlPlaneSnapshot;
use relayq_core::dto::task::{AckRequest, ProgressRequest, PublishResponse};
use relayq_core::dto::worker::{ReserveRequest, WorkerRegistration};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ClientError, Result};
use crate::transport::{ControlPlane, Transport, WorkerTransport};

/// HTTP client for the RelayQ broker API
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Base URL of the broker (e.g., "http://localhost:8765")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl HttpTransport {
    /// Create a new transport for the broker at `base_url`
    ///
    /// # Example
    /// ```
    /// use relayq_client::HttpTransport;
    ///
    /// let transport = HttpTransport::new("http://localhost:8765");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a transport with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Get the base URL of the broker
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/api/workers/<name>[/<action>]` with the name as one encoded segment
    fn worker_url(&self, worker: &str, action: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            ClientError::InvalidRequest(format!("Invalid broker URL {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::InvalidRequest(format!("Invalid broker URL {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(["api", "workers", worker])
            .extend(action);
        Ok(url)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize a JSON body
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = Self::check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Check the status code of a response that carries no body
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        Self::check_status(response).await.map(|_| ())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(error_text),
            StatusCode::SERVICE_UNAVAILABLE => ClientError::Unavailable(error_text),
            _ => ClientError::api_error(status.as_u16(), error_text),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn publish(&self, job: Job) -> Result<Uuid> {
        let response = self
            .client
            .post(self.url("/api/tasks"))
            .json(&job)
            .send()
            .await?;

        let published: PublishResponse = self.handle_response(response).await?;
        Ok(published.id)
    }

    async fn snapshot(&self, id: Uuid) -> Result<JobSnapshot> {
        let response = self
            .client
            .get(self.url(&format!("/api/tasks/{}", id)))
            .send()
            .await?;

        self.handle_response(response).await
    }
}

#[async_trait]
impl WorkerTransport for HttpTransport {
    async fn register_worker(&self, registration: WorkerRegistration) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/workers/register"))
            .json(&registration)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    async fn heartbeat(&self, worker: &str) -> Result<()> {
        let response = self
            .client
            .post(self.worker_url(worker, Some("heartbeat"))?)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    async fn reserve(&self, worker: &str, routing_keys: &[String]) -> Result<Option<Job>> {
        let response = self
            .client
            .post(self.worker_url(worker, Some("reserve"))?)
            .json(&ReserveRequest {
                routing_keys: routing_keys.to_vec(),
            })
            .send()
            .await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        self.handle_response(response).await.map(Some)
    }

    async fn report_progress(&self, id: Uuid, worker: &str, info: Value) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/api/tasks/{}/progress", id)))
            .json(&ProgressRequest {
                worker: worker.to_string(),
                info,
            })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    async fn acknowledge(&self, id: Uuid, worker: &str, outcome: TaskOutcome) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/api/tasks/{}/ack", id)))
            .json(&AckRequest {
                worker: worker.to_string(),
                outcome,
            })
            .send()
            .await?;

        self.handle_empty_response(response).await
    }

    async fn deregister_worker(&self, worker: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.worker_url(worker, None)?)
            .send()
            .await?;

        self.handle_empty_response(response).await
    }
}

#[async_trait]
impl ControlPlane for HttpTransport {
    async fn inspect(&self) -> Result<ControlPlaneSnapshot> {
        let response = self
            .client
            .get(self.url("/api/control/inspect"))
            .send()
            .await?;

        self.handle_response(response).await
    }
}
