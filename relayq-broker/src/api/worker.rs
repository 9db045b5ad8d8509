//! Worker API Handlers
//!
//! Registration, liveness and job reservation.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relayq_client::WorkerTransport;
use relayq_core::dto::worker::{ReserveRequest, WorkerRegistration};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};

// =============================================================================
// Worker Registration & Lifecycle
// =============================================================================

/// POST /api/workers/register
pub async fn register_worker(
    State(state): State<AppState>,
    Json(req): Json<WorkerRegistration>,
) -> ApiResult<StatusCode> {
    tracing::info!(
        "Registering worker: {} (tags: [{}], slots: {})",
        req.name,
        req.tags.join(", "),
        req.concurrency
    );

    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Worker name cannot be empty".to_string()));
    }

    state.register_worker(req).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/workers/{name}/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    tracing::debug!("Heartbeat from worker: {}", name);

    state.heartbeat(&name).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/workers/{name}
/// Jobs the worker still holds go back to the queue
pub async fn deregister_worker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deregistering worker: {}", name);

    state.deregister_worker(&name).await?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Delivery
// =============================================================================

/// POST /api/workers/{name}/reserve
/// Returns the next eligible job, or 204 when there is none
pub async fn reserve(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<ReserveRequest>,
) -> ApiResult<Response> {
    match state.reserve(&name, &req.routing_keys).await? {
        Some(job) => {
            tracing::info!("Delivering task {} ({}) to {}", job.id, job.task, name);
            Ok(Json(job).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayq_client::{MemoryTransport, Transport};
    use relayq_core::domain::job::{Job, TaskArgs};
    use std::sync::Arc;

    fn registration(name: &str, tags: &[&str]) -> WorkerRegistration {
        WorkerRegistration {
            name: name.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            capabilities: vec![],
            concurrency: 1,
        }
    }

    #[tokio::test]
    async fn test_reserve_empty_queue_is_204() {
        let state: AppState = Arc::new(MemoryTransport::new());
        register_worker(State(state.clone()), Json(registration("w", &[])))
            .await
            .unwrap();

        let response = reserve(
            State(state),
            Path("w".to_string()),
            Json(ReserveRequest::default()),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_reserve_delivers_keyed_job() {
        let state: AppState = Arc::new(MemoryTransport::new());
        register_worker(State(state.clone()), Json(registration("rpi4-1", &["rpi4"])))
            .await
            .unwrap();
        state
            .publish(Job::new("relayq.run_command", TaskArgs::new(), Some("rpi4".into())))
            .await
            .unwrap();

        let response = reserve(
            State(state),
            Path("rpi4-1".to_string()),
            Json(ReserveRequest {
                routing_keys: vec!["rpi4".into()],
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unregistered_heartbeat_is_404() {
        let state: AppState = Arc::new(MemoryTransport::new());
        let response = heartbeat(State(state), Path("ghost".to_string()))
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected() {
        let state: AppState = Arc::new(MemoryTransport::new());
        let response = register_worker(State(state), Json(registration("  ", &[])))
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
