//! Worker configuration
//!
//! Settings come from `RELAYQ_*` environment variables; anything unset falls
//! back to the defaults below.

use anyhow::Context;
use relayq_core::domain::worker::WorkerTag;
use std::time::Duration;

/// Hard wall-clock limit applied to every task (5 hours)
pub const DEFAULT_TASK_TIME_LIMIT: Duration = Duration::from_secs(5 * 60 * 60);

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Name reported to the broker; must be unique across the fleet
    pub worker_name: String,

    /// Broker base URL (e.g., "http://localhost:8765")
    pub broker_url: String,

    /// Routing keys this worker serves. Empty means "infer from the name".
    pub tags: Vec<String>,

    /// Concurrent task slots on this host
    pub concurrency: usize,

    /// Completed tasks after which the worker process is recycled
    pub max_tasks_per_child: usize,

    /// Hard limit for a single task body
    pub task_time_limit: Duration,

    /// How often to ask the broker for work when slots are free
    pub poll_interval: Duration,

    /// How often to tell the broker this worker is alive
    pub heartbeat_interval: Duration,

    pub ffmpeg_bin: String,
    pub whisper_bin: String,
}

impl Config {
    pub fn new(worker_name: String, broker_url: String) -> Self {
        Self {
            worker_name,
            broker_url,
            tags: Vec::new(),
            concurrency: 2,
            max_tasks_per_child: 50,
            task_time_limit: DEFAULT_TASK_TIME_LIMIT,
            poll_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(30),
            ffmpeg_bin: "ffmpeg".to_string(),
            whisper_bin: "whisper".to_string(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognised variables:
    /// - RELAYQ_WORKER_NAME (default: $HOSTNAME)
    /// - RELAYQ_BROKER_URL (default: http://localhost:8765)
    /// - RELAYQ_WORKER_TAGS (comma separated, e.g. "mac-mini")
    /// - RELAYQ_CONCURRENCY (default: 2)
    /// - RELAYQ_MAX_TASKS_PER_CHILD (default: 50)
    /// - RELAYQ_TASK_TIME_LIMIT (seconds, default: 18000)
    /// - RELAYQ_POLL_INTERVAL (milliseconds, default: 1000)
    /// - RELAYQ_HEARTBEAT_INTERVAL (seconds, default: 30)
    /// - RELAYQ_FFMPEG_BIN / RELAYQ_WHISPER_BIN (default: looked up on PATH)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(name) = lookup("RELAYQ_WORKER_NAME") {
            config.worker_name = name;
        }
        if let Some(url) = lookup("RELAYQ_BROKER_URL") {
            config.broker_url = url;
        }
        if let Some(tags) = lookup("RELAYQ_WORKER_TAGS") {
            config.tags = parse_tags(&tags);
        }
        if let Some(ffmpeg) = lookup("RELAYQ_FFMPEG_BIN") {
            config.ffmpeg_bin = ffmpeg;
        }
        if let Some(whisper) = lookup("RELAYQ_WHISPER_BIN") {
            config.whisper_bin = whisper;
        }

        if let Some(value) = parse_number(&lookup, "RELAYQ_CONCURRENCY")? {
            config.concurrency = value as usize;
        }
        if let Some(value) = parse_number(&lookup, "RELAYQ_MAX_TASKS_PER_CHILD")? {
            config.max_tasks_per_child = value as usize;
        }
        if let Some(value) = parse_number(&lookup, "RELAYQ_TASK_TIME_LIMIT")? {
            config.task_time_limit = Duration::from_secs(value);
        }
        if let Some(value) = parse_number(&lookup, "RELAYQ_POLL_INTERVAL")? {
            config.poll_interval = Duration::from_millis(value);
        }
        if let Some(value) = parse_number(&lookup, "RELAYQ_HEARTBEAT_INTERVAL")? {
            config.heartbeat_interval = Duration::from_secs(value);
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_name.is_empty() {
            anyhow::bail!("worker_name cannot be empty");
        }

        if !self.broker_url.starts_with("http://") && !self.broker_url.starts_with("https://") {
            anyhow::bail!("broker_url must start with http:// or https://");
        }

        if self.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than 0");
        }

        if self.max_tasks_per_child == 0 {
            anyhow::bail!("max_tasks_per_child must be greater than 0");
        }

        if self.task_time_limit.is_zero() {
            anyhow::bail!("task_time_limit must be greater than 0");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.heartbeat_interval.is_zero() {
            anyhow::bail!("heartbeat_interval must be greater than 0");
        }

        Ok(())
    }

    /// Tags advertised at registration
    ///
    /// Explicit tags win. Without them the worker falls back to classifying
    /// its own name, so `macmini-01` still serves the `mac-mini` key.
    pub fn effective_tags(&self) -> Vec<String> {
        if !self.tags.is_empty() {
            return self.tags.clone();
        }

        match WorkerTag::from_name(&self.worker_name) {
            WorkerTag::Unknown => Vec::new(),
            tag => vec![tag.as_str().to_string()],
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let worker_name = std::env::var("HOSTNAME")
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("worker-{}", uuid::Uuid::new_v4().simple()));

        Self::new(worker_name, "http://localhost:8765".to_string())
    }
}

fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

fn parse_number(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<u64>> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, raw))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::new("macmini-01".into(), "http://localhost:8765".into());
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.max_tasks_per_child, 50);
        assert_eq!(config.task_time_limit, Duration::from_secs(18_000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("RELAYQ_WORKER_NAME", "rpi4-worker-2"),
            ("RELAYQ_BROKER_URL", "http://broker:8765"),
            ("RELAYQ_WORKER_TAGS", "RPi4, ,tool-box"),
            ("RELAYQ_CONCURRENCY", "1"),
            ("RELAYQ_POLL_INTERVAL", "250"),
        ]))
        .unwrap();

        assert_eq!(config.worker_name, "rpi4-worker-2");
        assert_eq!(config.broker_url, "http://broker:8765");
        assert_eq!(config.tags, vec!["rpi4", "tool-box"]);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_unparsable_number_is_an_error() {
        let err = Config::from_lookup(lookup(&[("RELAYQ_CONCURRENCY", "lots")])).unwrap_err();
        assert!(err.to_string().contains("RELAYQ_CONCURRENCY"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::new("w".into(), "http://localhost:8765".into());
        assert!(config.validate().is_ok());

        config.broker_url = "localhost:8765".into();
        assert!(config.validate().is_err());
        config.broker_url = "http://localhost:8765".into();

        config.concurrency = 0;
        assert!(config.validate().is_err());
        config.concurrency = 2;

        config.max_tasks_per_child = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_tags() {
        let mut config = Config::new("macmini-01".into(), "http://localhost:8765".into());
        assert_eq!(config.effective_tags(), vec!["mac-mini"]);

        config.worker_name = "oci-vm-3".into();
        assert!(config.effective_tags().is_empty());

        config.tags = vec!["rpi4".into()];
        assert_eq!(config.effective_tags(), vec!["rpi4"]);
    }
}
