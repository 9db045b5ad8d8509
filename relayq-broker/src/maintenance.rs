//! Background upkeep of the in-memory transport
//!
//! Reaps workers that stopped heartbeating (their jobs are redelivered) and
//! drops results nobody read within the retention window.

use relayq_client::MemoryTransport;
use std::sync::Arc;
use tokio::time;
use tracing::{debug, info};

use crate::config::BrokerConfig;

/// Runs one maintenance pass
pub fn sweep(transport: &MemoryTransport, config: &BrokerConfig) {
    let lost = transport.reap_expired_workers(config.worker_ttl);
    if !lost.is_empty() {
        info!("Reaped {} silent worker(s): {}", lost.len(), lost.join(", "));
    }

    let purged = transport.purge_expired_results(config.result_ttl);
    if purged > 0 {
        debug!("Dropped {} expired result(s)", purged);
    }
}

/// Spawns the periodic maintenance loop
pub fn spawn(transport: Arc<MemoryTransport>, config: BrokerConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(config.sweep_interval());

        loop {
            ticker.tick().await;
            sweep(&transport, &config);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayq_client::{Transport, WorkerTransport};
    use relayq_core::domain::job::{Job, JobState, TaskArgs};
    use relayq_core::dto::worker::WorkerRegistration;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sweep_redelivers_from_silent_workers() {
        let transport = MemoryTransport::new();
        transport
            .register_worker(WorkerRegistration {
                name: "rpi4-1".into(),
                tags: vec![],
                capabilities: vec![],
                concurrency: 1,
            })
            .await
            .unwrap();
        let id = transport
            .publish(Job::new("relayq.run_command", TaskArgs::new(), None))
            .await
            .unwrap();
        transport.reserve("rpi4-1", &[]).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        let config = BrokerConfig {
            worker_ttl: Duration::from_millis(5),
            ..BrokerConfig::default()
        };
        sweep(&transport, &config);

        assert_eq!(transport.queued_len(), 1);
        assert_eq!(transport.snapshot(id).await.unwrap().state, JobState::Active);
    }
}
