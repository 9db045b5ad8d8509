//! Target selection
//!
//! Maps a job type and its parameters to a destination under the routing
//! policy. Selection is a pure function of its inputs: no I/O, no shared
//! state, safe to call from any number of tasks at once.
//!
//! Resolution order:
//! 1. unknown job type → [`SelectionError::UnknownJobType`]
//! 2. constraints are evaluated before any preference is considered
//! 3. empty `prefer` and `fallback` → pooled destination
//! 4. first known tag in `prefer`, then first known tag in `fallback`
//! 5. nothing known → pooled destination

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::policy::{ConstraintSet, RoutingPolicy};

/// Free-form attributes describing one submission (e.g. `size_mb`)
pub type JobParams = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("job does not meet route constraints for {job_type}: {constraint} is {limit}, job has {actual}")]
    ConstraintViolated {
        job_type: String,
        constraint: String,
        limit: f64,
        actual: f64,
    },

    #[error("route {job_type} declares constraint '{constraint}' which has no evaluator")]
    UnsupportedConstraint { job_type: String, constraint: String },

    #[error("route {job_type} has an invalid value for '{constraint}': {reason}")]
    InvalidConstraint {
        job_type: String,
        constraint: String,
        reason: String,
    },

    #[error("malformed job parameters: {0}")]
    MalformedParams(String),
}

/// Where a job should run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Mac,
    Rpi,
    /// Any available worker
    Pooled,
}

impl Destination {
    /// Default identifier, used when the policy does not override it
    pub fn name(self) -> &'static str {
        match self {
            Destination::Mac => "mac-mini",
            Destination::Rpi => "rpi4",
            Destination::Pooled => "pooled",
        }
    }

    /// Routing key to submit with; pooled jobs carry none
    pub fn routing_key(self) -> Option<&'static str> {
        match self {
            Destination::Mac => Some("mac-mini"),
            Destination::Rpi => Some("rpi4"),
            Destination::Pooled => None,
        }
    }

    /// Fixed tag → destination table. The flag marks aliased tags.
    ///
    /// `rpi3` has no destination of its own and reuses the rpi4 one.
    fn for_tag(tag: &str) -> Option<(Destination, bool)> {
        match tag {
            "macmini" => Some((Destination::Mac, false)),
            "rpi4" => Some((Destination::Rpi, false)),
            "rpi3" => Some((Destination::Rpi, true)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which part of the route produced the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    Preferred,
    Fallback,
    Default,
}

/// Outcome of a successful selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub destination: Destination,
    pub source: SelectionSource,
    /// Tag that matched, absent for the default destination
    pub matched_tag: Option<String>,
    /// The tag matched only through an alias (no dedicated destination)
    pub aliased: bool,
}

impl Selection {
    fn pooled() -> Self {
        Self {
            destination: Destination::Pooled,
            source: SelectionSource::Default,
            matched_tag: None,
            aliased: false,
        }
    }
}

/// Closed set of constraint evaluators
#[derive(Debug, Clone, Copy, PartialEq)]
enum Constraint {
    MaxSizeMb(f64),
}

impl Constraint {
    fn parse(job_type: &str, key: &str, value: &Value) -> Result<Self, SelectionError> {
        match key {
            "max_size_mb" => value.as_f64().map(Constraint::MaxSizeMb).ok_or_else(|| {
                SelectionError::InvalidConstraint {
                    job_type: job_type.to_string(),
                    constraint: key.to_string(),
                    reason: format!("expected a number, found {value}"),
                }
            }),
            _ => Err(SelectionError::UnsupportedConstraint {
                job_type: job_type.to_string(),
                constraint: key.to_string(),
            }),
        }
    }

    fn check(self, job_type: &str, params: &JobParams) -> Result<(), SelectionError> {
        match self {
            Constraint::MaxSizeMb(limit) => {
                let size = numeric_param(params, "size_mb")?.unwrap_or(0.0);
                if size > limit {
                    return Err(SelectionError::ConstraintViolated {
                        job_type: job_type.to_string(),
                        constraint: "max_size_mb".to_string(),
                        limit,
                        actual: size,
                    });
                }
                Ok(())
            }
        }
    }
}

/// Every declared key must have an evaluator before any is checked
fn evaluate_constraints(
    job_type: &str,
    constraints: &ConstraintSet,
    params: &JobParams,
) -> Result<(), SelectionError> {
    let parsed = constraints
        .iter()
        .map(|(key, value)| Constraint::parse(job_type, key, value))
        .collect::<Result<Vec<_>, _>>()?;

    parsed
        .into_iter()
        .try_for_each(|constraint| constraint.check(job_type, params))
}

fn numeric_param(params: &JobParams, key: &str) -> Result<Option<f64>, SelectionError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| {
            SelectionError::MalformedParams(format!("'{key}' must be a number, found {value}"))
        }),
    }
}

fn first_known(tags: &[String], source: SelectionSource) -> Option<Selection> {
    tags.iter().find_map(|tag| {
        Destination::for_tag(tag).map(|(destination, aliased)| Selection {
            destination,
            source,
            matched_tag: Some(tag.clone()),
            aliased,
        })
    })
}

/// Selects a destination for `job_type`
pub fn select(
    job_type: &str,
    params: &JobParams,
    policy: &RoutingPolicy,
) -> Result<Selection, SelectionError> {
    let route = policy
        .route(job_type)
        .ok_or_else(|| SelectionError::UnknownJobType(job_type.to_string()))?;

    evaluate_constraints(job_type, &route.constraints, params)?;

    if route.prefer.is_empty() && route.fallback.is_empty() {
        return Ok(Selection::pooled());
    }

    Ok(first_known(&route.prefer, SelectionSource::Preferred)
        .or_else(|| first_known(&route.fallback, SelectionSource::Fallback))
        .unwrap_or_else(Selection::pooled))
}

/// Parses the JSON parameter argument of the selection CLI
///
/// The input must be a JSON object; anything else is malformed.
pub fn parse_params(input: &str) -> Result<JobParams, SelectionError> {
    match serde_json::from_str::<Value>(input) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(SelectionError::MalformedParams(format!(
            "expected a JSON object, found {other}"
        ))),
        Err(e) => Err(SelectionError::MalformedParams(e.to_string())),
    }
}
