//! # ServiceBinding Controller
//!
//! A Kubernetes controller that reconciles `ServiceBinding` custom resources
//! against Open Service Broker API brokers.
//!
//! ## Overview
//!
//! For every ServiceBinding the controller:
//!
//! 1. **Resolves the catalog chain** - the referenced ServiceInstance and the
//!    ClusterServiceClass / ClusterServicePlan / ClusterServiceBroker behind it
//! 2. **Calls the broker** - `PUT`/`DELETE` on the Open Service Broker
//!    binding endpoint, with merged inline and secret-sourced parameters
//! 3. **Materializes credentials** - the broker's response lands in the
//!    secret named by `spec.secretName`, owned by the binding
//! 4. **Drives the status state machine** - conditions, the in-flight
//!    operation record, and properties snapshots survive retries and crashes
//! 5. **Mitigates orphans** - when a bind outcome is ambiguous, a
//!    compensating unbind runs until the broker confirms
//!
//! ## Features
//!
//! - **Durable operations**: all in-flight state lives in the binding's
//!   status; a restart resumes where the last pass stopped
//! - **Bounded retries**: transport failures retry within a configurable
//!   window (7 days by default) before the binding fails terminally
//! - **Redacted parameters**: secret-sourced parameter values never appear in
//!   status, only a checksum of the real values does
//! - **Prometheus metrics** and HTTP probes for liveness/readiness

pub mod broker;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
