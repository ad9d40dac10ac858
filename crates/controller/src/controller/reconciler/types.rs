//! # Types
//!
//! Core types for the reconciler.

use crate::broker::{BrokerClient, BrokerError};
use crate::cluster::{
    BindingStatusWriter, ClusterError, EventRecorder, ReferenceResolver, SecretStore,
};
use crate::config::ControllerConfig;
use std::sync::Arc;
use thiserror::Error;

/// Errors that make a reconciliation pass fail and be rescheduled.
///
/// Terminal broker outcomes do not surface here; they are recorded on the
/// binding's status and the pass returns `Ok` so it is not retried.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    /// A cluster read or write failed, including optimistic concurrency
    /// conflicts on status writes.
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    /// A broker call failed in a way that will be retried.
    #[error("broker call failed: {0}")]
    Broker(#[from] BrokerError),
    /// A precondition is not met yet; the pass is retried later.
    #[error("{0}")]
    Transient(String),
}

/// Reconciler context shared across all reconciliations.
///
/// Every external interaction goes through a trait object so tests can drive
/// the full state machine against in-memory fakes.
#[derive(Clone)]
pub struct Reconciler {
    pub config: ControllerConfig,
    pub broker: Arc<dyn BrokerClient>,
    pub resolver: Arc<dyn ReferenceResolver>,
    pub secrets: Arc<dyn SecretStore>,
    pub status: Arc<dyn BindingStatusWriter>,
    pub events: Arc<dyn EventRecorder>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
