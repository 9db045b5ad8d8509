//! Configuration module
//!
//! Broker location and routing policy path, resolved from flags or env.

use anyhow::{Context, Result};
use relayq_client::{HttpTransport, JobClient};
use relayq_core::PolicyStore;
use std::path::PathBuf;
use std::sync::Arc;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the broker
    pub broker_url: String,

    /// Routing policy document
    pub policy_path: PathBuf,
}

impl Config {
    pub fn transport(&self) -> Arc<HttpTransport> {
        Arc::new(HttpTransport::new(&self.broker_url))
    }

    pub fn job_client(&self) -> JobClient {
        JobClient::new(self.transport())
    }

    pub fn load_policy(&self) -> Result<PolicyStore> {
        PolicyStore::load(&self.policy_path)
            .with_context(|| format!("Failed to load routing policy {}", self.policy_path.display()))
    }
}
