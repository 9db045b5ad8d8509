//! RelayQ Broker
//!
//! Development broker: an in-memory transport behind the HTTP API that
//! `HttpTransport` speaks. Jobs and results live in memory only.

use anyhow::{Context, Result};
use relayq_client::MemoryTransport;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod maintenance;

use crate::config::BrokerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relayq_broker=info,relayq_client=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting RelayQ Broker...");

    let config = BrokerConfig::from_env().context("Invalid broker configuration")?;
    tracing::info!(
        "Worker TTL {:?}, result TTL {:?}",
        config.worker_ttl,
        config.result_ttl
    );

    let transport = Arc::new(MemoryTransport::new());
    let _maintenance = maintenance::spawn(transport.clone(), config.clone());

    // Build router with all API endpoints
    let app = api::create_router(transport);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Broker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
