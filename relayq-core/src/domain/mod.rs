//! Core domain types
//!
//! These types are shared between job producers (which submit and wait),
//! workers (which execute and acknowledge) and the broker (which stores
//! in-flight state in memory).

pub mod episode;
pub mod job;
pub mod task;
pub mod worker;
