//! Routing policy document
//!
//! The policy is loaded once per process and never mutated afterwards;
//! picking up a changed file requires a restart.
//!
//! ```yaml
//! routes:
//!   transcribe:
//!     constraints: { max_size_mb: 500 }
//!     prefer: [macmini]
//!     fallback: [rpi4]
//! destinations:
//!   mac: .github/workflows/transcribe_mac.yml
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::selector::Destination;

/// Location of the policy document, relative to the working directory
pub const DEFAULT_POLICY_PATH: &str = "policy/policy.yaml";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy file not found or unreadable: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing policy file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Job type → route mapping, plus optional destination identifiers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    #[serde(default, deserialize_with = "null_as_default")]
    pub routes: BTreeMap<String, Route>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub destinations: DestinationNames,
}

impl RoutingPolicy {
    pub fn route(&self, job_type: &str) -> Option<&Route> {
        self.routes.get(job_type)
    }

    /// Identifier printed for a destination, honoring policy overrides
    pub fn identifier(&self, destination: Destination) -> &str {
        let custom = match destination {
            Destination::Mac => self.destinations.mac.as_deref(),
            Destination::Rpi => self.destinations.rpi.as_deref(),
            Destination::Pooled => self.destinations.pooled.as_deref(),
        };
        custom.unwrap_or(destination.name())
    }
}

/// How one job type is steered
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(default, deserialize_with = "null_as_default")]
    pub constraints: ConstraintSet,

    /// Worker tags tried first, in order
    #[serde(default, deserialize_with = "null_as_default")]
    pub prefer: Vec<String>,

    /// Worker tags tried when nothing in `prefer` is known
    #[serde(default, deserialize_with = "null_as_default")]
    pub fallback: Vec<String>,
}

/// Sparse constraint key → threshold mapping, kept verbatim from the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintSet(pub BTreeMap<String, Value>);

impl ConstraintSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Optional per-destination identifiers (e.g. workflow file names)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationNames {
    pub mac: Option<String>,
    pub rpi: Option<String>,
    pub pooled: Option<String>,
}

/// Immutable, shareable handle to the loaded policy
#[derive(Debug, Clone)]
pub struct PolicyStore {
    policy: Arc<RoutingPolicy>,
}

impl PolicyStore {
    /// Reads and parses the policy document at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Loads the document at [`DEFAULT_POLICY_PATH`]
    pub fn load_default() -> Result<Self, PolicyError> {
        Self::load(DEFAULT_POLICY_PATH)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, PolicyError> {
        let policy: RoutingPolicy = serde_yaml::from_str(yaml)?;
        Ok(Self::new(policy))
    }

    pub fn new(policy: RoutingPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }
}

/// YAML writes an empty list as `prefer:`; treat that null like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const POLICY: &str = r#"
routes:
  transcribe:
    constraints:
      max_size_mb: 500
      needs_ffmpeg: true
    prefer: [macmini]
    fallback: [rpi4]
  batch:
    prefer:
    fallback:
destinations:
  mac: .github/workflows/transcribe_mac.yml
"#;

    #[test]
    fn test_parse_policy() {
        let store = PolicyStore::from_yaml_str(POLICY).unwrap();
        let policy = store.policy();

        let route = policy.route("transcribe").unwrap();
        assert_eq!(route.prefer, vec!["macmini"]);
        assert_eq!(route.fallback, vec!["rpi4"]);
        assert_eq!(route.constraints.iter().count(), 2);

        let batch = policy.route("batch").unwrap();
        assert!(batch.prefer.is_empty());
        assert!(batch.fallback.is_empty());
        assert!(batch.constraints.is_empty());
    }

    #[test]
    fn test_destination_identifiers() {
        let store = PolicyStore::from_yaml_str(POLICY).unwrap();
        let policy = store.policy();

        assert_eq!(
            policy.identifier(Destination::Mac),
            ".github/workflows/transcribe_mac.yml"
        );
        assert_eq!(policy.identifier(Destination::Rpi), "rpi4");
        assert_eq!(policy.identifier(Destination::Pooled), "pooled");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(POLICY.as_bytes()).unwrap();

        let store = PolicyStore::load(file.path()).unwrap();
        assert!(store.policy().route("transcribe").is_some());
    }

    #[test]
    fn test_missing_file() {
        let err = PolicyStore::load("/definitely/not/here/policy.yaml").unwrap_err();
        assert!(matches!(err, PolicyError::Io { .. }));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = PolicyStore::from_yaml_str("routes: [unclosed").unwrap_err();
        assert!(matches!(err, PolicyError::Parse(_)));
    }
}
