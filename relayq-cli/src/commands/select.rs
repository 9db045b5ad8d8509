//! Target selection command

use anyhow::Result;
use colored::Colorize;
use relayq_core::{RoutingPolicy, Selection, SelectionError, parse_params, select};

use crate::config::Config;

/// Parses `params` and selects a destination for `job_type`
pub fn resolve(
    job_type: &str,
    params: &str,
    policy: &RoutingPolicy,
) -> Result<Selection, SelectionError> {
    let params = parse_params(params)?;
    select(job_type, &params, policy)
}

/// Prints the destination identifier on stdout; details go to stderr
pub fn handle_select(job_type: &str, params: &str, config: &Config) -> Result<()> {
    let store = config.load_policy()?;
    let policy = store.policy();
    let selection = resolve(job_type, params, policy)?;

    if selection.aliased {
        eprintln!(
            "{} tag '{}' has no destination of its own; using {}",
            "warning:".yellow().bold(),
            selection.matched_tag.as_deref().unwrap_or_default(),
            selection.destination
        );
    }
    eprintln!(
        "{} {} via {:?}",
        "▸".cyan(),
        selection.destination.to_string().bold(),
        selection.source
    );
    println!("{}", policy.identifier(selection.destination));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayq_core::{Destination, PolicyStore};

    const POLICY: &str = r#"
routes:
  transcribe:
    constraints: { max_size_mb: 500 }
    prefer: [macmini]
    fallback: [rpi4]
destinations:
  mac: .github/workflows/transcribe_mac.yml
"#;

    #[test]
    fn test_resolve_preferred_destination() {
        let store = PolicyStore::from_yaml_str(POLICY).unwrap();
        let selection = resolve("transcribe", r#"{"size_mb": 120}"#, store.policy()).unwrap();
        assert_eq!(selection.destination, Destination::Mac);
        assert_eq!(
            store.policy().identifier(selection.destination),
            ".github/workflows/transcribe_mac.yml"
        );
    }

    #[test]
    fn test_resolve_rejects_bad_input() {
        let store = PolicyStore::from_yaml_str(POLICY).unwrap();
        assert!(matches!(
            resolve("transcribe", "[1, 2]", store.policy()),
            Err(SelectionError::MalformedParams(_))
        ));
        assert!(matches!(
            resolve("resize", "{}", store.policy()),
            Err(SelectionError::UnknownJobType(_))
        ));
        assert!(matches!(
            resolve("transcribe", r#"{"size_mb": 900}"#, store.policy()),
            Err(SelectionError::ConstraintViolated { .. })
        ));
    }
}
