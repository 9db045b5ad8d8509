//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relayq_client::ClientError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unavailable(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NotFound(msg) => ApiError::NotFound(msg),
            ClientError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            ClientError::Unavailable(msg) => ApiError::Unavailable(msg),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_status() {
        let status = |err: ClientError| ApiError::from(err).into_response().status();

        assert_eq!(status(ClientError::NotFound("job".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status(ClientError::InvalidRequest("dup".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ClientError::Unavailable("offline".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(ClientError::InternalError("state".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
