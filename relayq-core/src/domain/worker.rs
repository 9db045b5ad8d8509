//! Worker domain model
//!
//! Workers are never persisted. Every status query rebuilds these records
//! from a fresh control-plane snapshot.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coarse classification of an execution host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WorkerTag {
    #[serde(rename = "mac-mini")]
    MacMini,
    #[serde(rename = "rpi4")]
    Rpi4,
    #[serde(rename = "unknown")]
    Unknown,
}

impl WorkerTag {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerTag::MacMini => "mac-mini",
            WorkerTag::Rpi4 => "rpi4",
            WorkerTag::Unknown => "unknown",
        }
    }

    /// Parses an advertised tag, accepting the policy spellings as well
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "mac-mini" | "macmini" | "mac" => Some(WorkerTag::MacMini),
            "rpi4" => Some(WorkerTag::Rpi4),
            _ => None,
        }
    }

    /// Legacy classification by substring match on the worker's self-reported name
    ///
    /// Only used when a worker did not advertise a tag at registration.
    pub fn from_name(name: &str) -> Self {
        let name = name.to_ascii_lowercase();
        if name.contains("mac") {
            WorkerTag::MacMini
        } else if name.contains("rpi") {
            WorkerTag::Rpi4
        } else {
            WorkerTag::Unknown
        }
    }

    /// Classifies a worker, preferring advertised tags over name sniffing
    pub fn classify(name: &str, advertised: &[String]) -> Self {
        advertised
            .iter()
            .find_map(|tag| Self::parse(tag))
            .unwrap_or_else(|| Self::from_name(name))
    }
}

impl std::fmt::Display for WorkerTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Load view of a single worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub name: String,
    pub tag: WorkerTag,
    pub active: usize,
    pub queued: usize,
    /// Lifetime totals per task name
    pub processed: BTreeMap<String, u64>,
}

/// Fleet-wide view assembled from one control-plane snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStatus {
    pub online: bool,
    pub total_workers: usize,
    pub total_active: usize,
    pub total_queued: usize,
    pub workers: BTreeMap<String, WorkerRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AggregateStatus {
    /// No reachable workers; `error` explains why when the control plane failed
    pub fn offline(error: Option<String>) -> Self {
        Self {
            error,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_name() {
        assert_eq!(WorkerTag::from_name("macmini-01"), WorkerTag::MacMini);
        assert_eq!(WorkerTag::from_name("MacBook-worker"), WorkerTag::MacMini);
        assert_eq!(WorkerTag::from_name("rpi4-worker-2"), WorkerTag::Rpi4);
        assert_eq!(WorkerTag::from_name("oci-vm-3"), WorkerTag::Unknown);
    }

    #[test]
    fn test_advertised_tag_wins_over_name() {
        let tags = vec!["rpi4".to_string()];
        assert_eq!(WorkerTag::classify("macmini-01", &tags), WorkerTag::Rpi4);
        assert_eq!(WorkerTag::classify("macmini-01", &[]), WorkerTag::MacMini);
    }

    #[test]
    fn test_unrecognized_advertised_tags_fall_back_to_name() {
        let tags = vec!["gpu".to_string()];
        assert_eq!(WorkerTag::classify("rpi4-a", &tags), WorkerTag::Rpi4);
    }

    #[test]
    fn test_offline_status() {
        let status = AggregateStatus::offline(Some("connection refused".into()));
        assert!(!status.online);
        assert_eq!(status.total_workers, 0);
        assert_eq!(status.error.as_deref(), Some("connection refused"));
    }
}
