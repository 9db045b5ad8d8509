//! Broker registration with retry
//!
//! The broker may not be up yet when a worker starts (or restarts after a
//! recycle), so registration backs off exponentially before giving up.

use anyhow::Result;
use relayq_client::WorkerTransport;
use relayq_core::dto::worker::WorkerRegistration;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub max_attempts: u32,
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

/// Register with the broker using the default backoff
pub async fn register_with_retry(
    transport: &dyn WorkerTransport,
    registration: &WorkerRegistration,
) -> Result<()> {
    register_with_backoff(transport, registration, Backoff::default()).await
}

pub async fn register_with_backoff(
    transport: &dyn WorkerTransport,
    registration: &WorkerRegistration,
    backoff: Backoff,
) -> Result<()> {
    let mut attempt = 0;
    let mut delay = backoff.initial;

    loop {
        attempt += 1;

        match transport.register_worker(registration.clone()).await {
            Ok(()) => {
                if attempt > 1 {
                    info!(
                        "Successfully registered with broker after {} attempt(s)",
                        attempt
                    );
                }
                return Ok(());
            }
            Err(e) => {
                if attempt >= backoff.max_attempts {
                    error!(
                        "Failed to register with broker after {} attempts",
                        backoff.max_attempts
                    );
                    return Err(anyhow::anyhow!(
                        "Failed to register worker {} with broker: {}",
                        registration.name,
                        e
                    ));
                }

                warn!(
                    "Failed to register with broker (attempt {}/{}): {}",
                    attempt, backoff.max_attempts, e
                );
                warn!("Retrying in {:?}...", delay);

                tokio::time::sleep(delay).await;

                // Exponential backoff with cap
                delay = (delay * 2).min(backoff.max);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayq_client::{ControlPlane, MemoryTransport};
    use std::sync::Arc;

    fn registration() -> WorkerRegistration {
        WorkerRegistration {
            name: "macmini-01".into(),
            tags: vec!["mac-mini".into()],
            capabilities: vec!["shell".into()],
            concurrency: 2,
        }
    }

    const FAST: Backoff = Backoff {
        max_attempts: 3,
        initial: Duration::from_millis(1),
        max: Duration::from_millis(2),
    };

    #[tokio::test]
    async fn test_registers_when_broker_is_up() {
        let transport = MemoryTransport::new();
        register_with_backoff(&transport, &registration(), FAST)
            .await
            .unwrap();
        assert!(transport.inspect().await.unwrap().workers.contains_key("macmini-01"));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let transport = MemoryTransport::new();
        transport.set_online(false);
        let err = register_with_backoff(&transport, &registration(), FAST)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("macmini-01"));
    }

    #[tokio::test]
    async fn test_retries_until_broker_comes_up() {
        let transport = Arc::new(MemoryTransport::new());
        transport.set_online(false);

        let flipper = {
            let transport = transport.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                transport.set_online(true);
            })
        };

        let backoff = Backoff {
            max_attempts: 50,
            initial: Duration::from_millis(5),
            max: Duration::from_millis(10),
        };
        register_with_backoff(transport.as_ref(), &registration(), backoff)
            .await
            .unwrap();
        flipper.await.unwrap();
    }
}
