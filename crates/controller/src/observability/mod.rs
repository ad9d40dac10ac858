//! # Observability
//!
//! Prometheus metrics and the HTTP endpoint that serves them alongside the
//! liveness/readiness probes.

pub mod metrics;
pub mod server;
