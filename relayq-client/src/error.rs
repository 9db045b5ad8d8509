//! Error types for the RelayQ client

use relayq_core::domain::task::TaskFailure;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the transport or waiting on a job
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed (broker unreachable, connection reset, ...)
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Broker returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the broker
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Job or worker not known to the transport
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Transport cannot accept requests right now
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    /// Local wait gave up; the remote job keeps running
    #[error("Timed out after {waited:?} waiting for job {job_id}")]
    ClientTimeout { job_id: Uuid, waited: Duration },

    /// The job finished in Failure; displays the worker's message unchanged
    #[error(transparent)]
    TaskFailed(TaskFailure),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_)) || matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }

    /// The worker-reported failure, if this error carries one
    pub fn task_failure(&self) -> Option<&TaskFailure> {
        match self {
            Self::TaskFailed(failure) => Some(failure),
            _ => None,
        }
    }
}
