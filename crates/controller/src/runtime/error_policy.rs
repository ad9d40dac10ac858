//! # Error Policy
//!
//! Requeue decision for reconciliation passes that returned an error.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::ServiceBinding;
use crate::observability::metrics;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::error;

pub fn error_policy(
    binding: Arc<ServiceBinding>,
    err: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    metrics::increment_reconciliation_errors();
    error!(
        binding = %binding.name_any(),
        namespace = %binding.namespace().unwrap_or_default(),
        error = %err,
        "reconciliation error"
    );
    Action::requeue(ctx.config.error_requeue)
}
