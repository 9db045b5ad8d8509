//! RelayQ Core
//!
//! Core types and decision logic shared by every RelayQ component.
//!
//! This crate contains:
//! - Domain types: jobs, task failures, worker classification, fleet status
//! - DTOs: payloads exchanged with the transport
//! - Routing policy loading and target selection

pub mod domain;
pub mod dto;
pub mod policy;
pub mod selector;

pub use policy::{PolicyError, PolicyStore, RoutingPolicy};
pub use selector::{
    Destination, JobParams, Selection, SelectionError, SelectionSource, parse_params, select,
};
