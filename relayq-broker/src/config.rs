//! Broker configuration

use anyhow::Context;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Address the HTTP API listens on
    pub bind_addr: String,

    /// Silence after which a worker is declared lost and its jobs redelivered
    pub worker_ttl: Duration,

    /// How long acknowledged results stay readable
    pub result_ttl: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8765".to_string(),
            worker_ttl: Duration::from_secs(90),
            result_ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl BrokerConfig {
    /// Reads RELAYQ_BROKER_BIND, RELAYQ_WORKER_TTL (s) and RELAYQ_RESULT_TTL (s)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(addr) = lookup("RELAYQ_BROKER_BIND") {
            config.bind_addr = addr;
        }
        if let Some(raw) = lookup("RELAYQ_WORKER_TTL") {
            config.worker_ttl = seconds("RELAYQ_WORKER_TTL", &raw)?;
        }
        if let Some(raw) = lookup("RELAYQ_RESULT_TTL") {
            config.result_ttl = seconds("RELAYQ_RESULT_TTL", &raw)?;
        }

        if config.worker_ttl.is_zero() {
            anyhow::bail!("RELAYQ_WORKER_TTL must be greater than 0");
        }

        Ok(config)
    }

    /// How often the maintenance loop runs
    pub fn sweep_interval(&self) -> Duration {
        (self.worker_ttl / 3).max(Duration::from_secs(1))
    }
}

fn seconds(key: &str, raw: &str) -> anyhow::Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .with_context(|| format!("{} must be a number of seconds, got '{}'", key, raw))
}
