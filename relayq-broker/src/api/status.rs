//! Control-plane and dashboard handlers

use axum::{Json, extract::State};
use relayq_client::{ControlPlane, WorkerStatusAggregator};
use relayq_core::domain::worker::AggregateStatus;
use relayq_core::dto::control::ControlPlaneSnapshot;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// GET /api/control/inspect
/// Raw per-worker active/scheduled/stats snapshot
pub async fn inspect(State(state): State<AppState>) -> ApiResult<Json<ControlPlaneSnapshot>> {
    Ok(Json(state.inspect().await?))
}

/// GET /api/status
/// Fleet aggregate for dashboards; never fails
pub async fn aggregate_status(State(state): State<AppState>) -> Json<AggregateStatus> {
    Json(WorkerStatusAggregator::new(state).query().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayq_client::{MemoryTransport, WorkerTransport};
    use relayq_core::domain::worker::WorkerTag;
    use relayq_core::dto::worker::WorkerRegistration;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_status_without_workers_is_offline() {
        let Json(status) = aggregate_status(State(Arc::new(MemoryTransport::new()))).await;
        assert!(!status.online);
        assert_eq!(status.total_workers, 0);
    }

    #[tokio::test]
    async fn test_status_lists_registered_workers() {
        let state: AppState = Arc::new(MemoryTransport::new());
        state
            .register_worker(WorkerRegistration {
                name: "rpi4-worker-2".into(),
                tags: vec![],
                capabilities: vec![],
                concurrency: 1,
            })
            .await
            .unwrap();

        let Json(status) = aggregate_status(State(state.clone())).await;
        assert!(status.online);
        assert_eq!(status.workers["rpi4-worker-2"].tag, WorkerTag::Rpi4);

        let Json(snapshot) = inspect(State(state)).await.unwrap();
        assert!(snapshot.workers.contains_key("rpi4-worker-2"));
    }
}
