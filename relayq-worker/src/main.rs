//! RelayQ Worker
//!
//! Executes RelayQ jobs on one host of the fleet.
//!
//! Architecture:
//! - Configuration: `RELAYQ_*` environment variables with defaults
//! - Services: capability discovery (ffmpeg, whisper)
//! - Tasks: the named task contracts and their time limits
//! - Scheduler: registration, heartbeats, slot-bounded reservation, late ack
//! - Supervisor: restarts the worker process after its task budget is spent
//!
//! Started without `RELAYQ_WORKER_CHILD` the binary only supervises; the
//! child it spawns does the actual work.

mod config;
mod scheduler;
mod service;
mod supervisor;
mod tasks;

use anyhow::{Context, Result};
use relayq_client::HttpTransport;
use relayq_core::dto::worker::WorkerRegistration;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::scheduler::{JobPoller, PollerExit, register_with_retry};
use crate::service::{CapabilitiesService, StandardCapabilitiesService};
use crate::tasks::TaskRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relayq_worker=info,relayq_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = load_config()?;

    if !supervisor::is_child() {
        info!("Starting RelayQ worker supervisor for {}", config.worker_name);
        return supervisor::supervise().await;
    }

    match run_worker(config).await {
        Ok(PollerExit::Recycle) => std::process::exit(supervisor::RECYCLE_EXIT_CODE),
        Ok(PollerExit::Shutdown) => Ok(()),
        Err(e) => {
            error!("Worker error: {:#}", e);
            Err(e)
        }
    }
}

async fn run_worker(config: Config) -> Result<PollerExit> {
    info!(
        "Loaded configuration: worker_name={}, broker_url={}",
        config.worker_name, config.broker_url
    );

    // Initialize broker client
    let transport = Arc::new(HttpTransport::new(config.broker_url.clone()));

    let capabilities = StandardCapabilitiesService::for_tools(&config.ffmpeg_bin, &config.whisper_bin)
        .discover()
        .context("Failed to discover capabilities")?;

    info!("Discovered {} capabilities", capabilities.len());
    for cap in &capabilities {
        info!("  - {}", cap);
    }

    let registration = WorkerRegistration {
        name: config.worker_name.clone(),
        tags: config.effective_tags(),
        capabilities,
        concurrency: config.concurrency,
    };
    if registration.tags.is_empty() {
        info!("No tags advertised; this worker only receives pooled jobs");
    } else {
        info!("Serving routing keys: {}", registration.tags.join(", "));
    }

    // Register with broker (with retry logic)
    register_with_retry(transport.as_ref(), &registration).await?;
    info!("Registered with broker");

    let registry = Arc::new(TaskRegistry::standard(&config));
    for contract in registry.names().filter_map(|name| registry.contract(name)) {
        info!(
            "  task {} (limit {:?}, late ack: {})",
            contract.name, contract.time_limit, contract.acks_late
        );
    }

    let poller = JobPoller::new(config, transport, registry, registration);

    let exit = poller.run(shutdown_signal()).await?;
    info!("Worker stopped after {} task(s)", poller.completed());
    Ok(exit)
}

/// Loads and validates configuration from the environment
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Invalid worker configuration")?;
    config.validate()?;
    Ok(config)
}

async fn shutdown_signal() {
    match supervisor::stop_signal().await {
        Ok(signal) => info!("Shutdown signal received ({:?})", signal),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
