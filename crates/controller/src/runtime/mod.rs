//! # Runtime
//!
//! The watch loop driving reconciliations and the policy for rescheduling
//! failed passes.

pub mod error_policy;
pub mod watch_loop;

pub use watch_loop::{build_reconciler, run};
