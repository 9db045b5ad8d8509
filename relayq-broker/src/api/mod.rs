//! API Module
//!
//! HTTP surface of the development broker. Every handler delegates to the
//! shared in-memory transport; the routes mirror what `HttpTransport` calls.

pub mod error;
pub mod health;
pub mod status;
pub mod task;
pub mod worker;

use axum::{
    Router,
    routing::{delete, get, post},
};
use relayq_client::MemoryTransport;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared broker state
pub type AppState = Arc<MemoryTransport>;

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/api/health", get(health::health_check))
        // Producer endpoints
        .route("/api/tasks", post(task::publish))
        .route("/api/tasks/{id}", get(task::get_task))
        // Worker endpoints
        .route("/api/tasks/{id}/progress", post(task::report_progress))
        .route("/api/tasks/{id}/ack", post(task::acknowledge))
        .route("/api/workers/register", post(worker::register_worker))
        .route("/api/workers/{name}", delete(worker::deregister_worker))
        .route("/api/workers/{name}/heartbeat", post(worker::heartbeat))
        .route("/api/workers/{name}/reserve", post(worker::reserve))
        // Control plane and dashboard
        .route("/api/control/inspect", get(status::inspect))
        .route("/api/status", get(status::aggregate_status))
        // Add state and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
