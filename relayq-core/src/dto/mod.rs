//! Data Transfer Objects for the transport wire API
//!
//! Request and response bodies exchanged between producers, workers and the
//! broker. Domain types that travel as-is (`Job`, `JobSnapshot`) are not
//! duplicated here.

pub mod control;
pub mod task;
pub mod worker;
