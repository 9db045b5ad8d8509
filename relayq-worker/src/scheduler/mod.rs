//! Scheduler layer for the worker
//!
//! Registers with the broker, keeps the registration alive, reserves jobs
//! while slots are free and acknowledges each one after its body returns.

pub mod poller;
mod registration;

pub use poller::{JobPoller, PollerExit};
pub use registration::register_with_retry;
