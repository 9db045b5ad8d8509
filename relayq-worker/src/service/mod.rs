//! Service layer
//!
//! Host-facing logic that runs before the worker starts taking jobs.
//! Services are trait-based so the poller never depends on the host.

mod capabilities;

pub use capabilities::{CapabilitiesService, StandardCapabilitiesService};
