//! Task API Handlers
//!
//! Publishing, tracking and acknowledging jobs.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use relayq_client::{Transport, WorkerTransport};
use relayq_core::domain::job::{Job, JobSnapshot};
use relayq_core::dto::task::{AckRequest, ProgressRequest, PublishResponse};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /api/tasks
/// Enqueue a job; a repeated idempotency key returns the original id
pub async fn publish(
    State(state): State<AppState>,
    Json(job): Json<Job>,
) -> ApiResult<(StatusCode, Json<PublishResponse>)> {
    tracing::info!(
        "Publishing {} (routing key: {})",
        job.task,
        job.routing_key.as_deref().unwrap_or("pooled")
    );

    let id = state.publish(job).await?;

    Ok((StatusCode::CREATED, Json(PublishResponse { id })))
}

/// GET /api/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobSnapshot>> {
    tracing::debug!("Getting task: {}", id);

    Ok(Json(state.snapshot(id).await?))
}

/// POST /api/tasks/{id}/progress
pub async fn report_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ProgressRequest>,
) -> ApiResult<StatusCode> {
    tracing::debug!("Progress for task {} from {}", id, req.worker);

    state.report_progress(id, &req.worker, req.info).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/tasks/{id}/ack
/// Late acknowledgment carrying the terminal outcome
pub async fn acknowledge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AckRequest>,
) -> ApiResult<StatusCode> {
    tracing::info!(
        "Task {} acknowledged by {} ({})",
        id,
        req.worker,
        if req.outcome.is_success() { "success" } else { "failure" }
    );

    state.acknowledge(id, &req.worker, req.outcome).await?;

    Ok(StatusCode::NO_CONTENT)
}
