//! Fleet status aggregation
//!
//! Rebuilds a per-worker load view from one control-plane snapshot. Nothing is
//! cached: every query reflects the fleet at that moment, so two calls may
//! disagree.

use relayq_core::domain::worker::{AggregateStatus, WorkerRecord, WorkerTag};
use relayq_core::dto::control::ControlPlaneSnapshot;
use std::sync::Arc;
use tracing::warn;

use crate::transport::ControlPlane;

pub struct WorkerStatusAggregator {
    control: Arc<dyn ControlPlane>,
}

impl WorkerStatusAggregator {
    pub fn new(control: Arc<dyn ControlPlane>) -> Self {
        Self { control }
    }

    /// Current fleet view; an unreachable control plane is reported, not raised
    pub async fn query(&self) -> AggregateStatus {
        match self.control.inspect().await {
            Ok(snapshot) => aggregate(snapshot),
            Err(e) => {
                warn!("Control plane unreachable: {}", e);
                AggregateStatus::offline(Some(e.to_string()))
            }
        }
    }
}

/// Folds a raw snapshot into an [`AggregateStatus`]
pub fn aggregate(snapshot: ControlPlaneSnapshot) -> AggregateStatus {
    if snapshot.workers.is_empty() {
        return AggregateStatus::offline(None);
    }

    let workers: std::collections::BTreeMap<String, WorkerRecord> = snapshot
        .workers
        .into_iter()
        .map(|(name, worker)| {
            let record = WorkerRecord {
                tag: WorkerTag::classify(&name, &worker.tags),
                active: worker.active.len(),
                queued: worker.scheduled.len(),
                processed: worker.stats.map(|stats| stats.total).unwrap_or_default(),
                name: name.clone(),
            };
            (name, record)
        })
        .collect();

    AggregateStatus {
        online: true,
        total_workers: workers.len(),
        total_active: workers.values().map(|w| w.active).sum(),
        total_queued: workers.values().map(|w| w.queued).sum(),
        workers,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, Result};
    use crate::transport::{MemoryTransport, Transport, WorkerTransport};
    use async_trait::async_trait;
    use relayq_core::domain::job::{Job, TaskArgs};
    use relayq_core::domain::task::TaskOutcome;
    use relayq_core::dto::control::{TaskDescriptor, WorkerSnapshot};
    use relayq_core::dto::worker::WorkerRegistration;
    use serde_json::json;
    use uuid::Uuid;

    struct Unreachable;

    #[async_trait]
    impl ControlPlane for Unreachable {
        async fn inspect(&self) -> Result<ControlPlaneSnapshot> {
            Err(ClientError::Unavailable("connection refused".into()))
        }
    }

    fn descriptor(task: &str) -> TaskDescriptor {
        TaskDescriptor {
            id: Uuid::new_v4(),
            task: task.into(),
            routing_key: None,
        }
    }

    #[tokio::test]
    async fn test_unreachable_control_plane_is_offline() {
        let status = WorkerStatusAggregator::new(Arc::new(Unreachable)).query().await;
        assert!(!status.online);
        assert_eq!(status.total_workers, 0);
        assert_eq!(
            status.error.as_deref(),
            Some("Transport unavailable: connection refused")
        );
    }

    #[tokio::test]
    async fn test_zero_workers_is_offline() {
        let transport = Arc::new(MemoryTransport::new());
        let status = WorkerStatusAggregator::new(transport).query().await;
        assert!(!status.online);
        assert_eq!(status.total_workers, 0);
        assert_eq!(status.error, None);
    }

    #[test]
    fn test_classification_and_defaults() {
        let mut snapshot = ControlPlaneSnapshot::default();
        snapshot.workers.insert(
            "macmini-01".into(),
            WorkerSnapshot {
                active: vec![descriptor("relayq.transcode_video")],
                scheduled: vec![descriptor("relayq.transcribe_audio"), descriptor("relayq.run_command")],
                stats: None,
                tags: vec![],
            },
        );
        snapshot
            .workers
            .insert("rpi4-worker-2".into(), WorkerSnapshot::default());
        snapshot
            .workers
            .insert("oci-vm-3".into(), WorkerSnapshot::default());

        let status = aggregate(snapshot);
        assert!(status.online);
        assert_eq!(status.total_workers, 3);
        assert_eq!(status.total_active, 1);
        assert_eq!(status.total_queued, 2);
        assert_eq!(status.workers["macmini-01"].tag, WorkerTag::MacMini);
        assert_eq!(status.workers["rpi4-worker-2"].tag, WorkerTag::Rpi4);
        assert_eq!(status.workers["oci-vm-3"].tag, WorkerTag::Unknown);
        assert!(status.workers["macmini-01"].processed.is_empty());
    }

    #[test]
    fn test_advertised_tags_beat_name() {
        let mut snapshot = ControlPlaneSnapshot::default();
        snapshot.workers.insert(
            "oci-vm-3".into(),
            WorkerSnapshot {
                tags: vec!["rpi4".into()],
                ..WorkerSnapshot::default()
            },
        );
        assert_eq!(aggregate(snapshot).workers["oci-vm-3"].tag, WorkerTag::Rpi4);
    }

    #[tokio::test]
    async fn test_query_against_live_transport() {
        let transport = Arc::new(MemoryTransport::new());
        transport
            .register_worker(WorkerRegistration {
                name: "macmini-01".into(),
                tags: vec!["mac-mini".into()],
                capabilities: vec![],
                concurrency: 2,
            })
            .await
            .unwrap();

        let first = transport
            .publish(Job::new("relayq.run_command", TaskArgs::new(), Some("mac-mini".into())))
            .await
            .unwrap();
        transport
            .publish(Job::new("relayq.run_command", TaskArgs::new(), Some("mac-mini".into())))
            .await
            .unwrap();

        let keys = vec!["mac-mini".to_string()];
        transport.reserve("macmini-01", &keys).await.unwrap();
        transport
            .acknowledge(first, "macmini-01", TaskOutcome::Success { value: json!(null) })
            .await
            .unwrap();
        transport.reserve("macmini-01", &keys).await.unwrap();

        let status = WorkerStatusAggregator::new(transport).query().await;
        let mac = &status.workers["macmini-01"];
        assert!(status.online);
        assert_eq!(mac.tag, WorkerTag::MacMini);
        assert_eq!(mac.active, 1);
        assert_eq!(mac.queued, 0);
        assert_eq!(mac.processed.get("relayq.run_command"), Some(&1));
    }
}
