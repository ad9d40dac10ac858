//! # Reconciler
//!
//! The ServiceBinding state machine. One pass looks at a single binding and
//! routes it to exactly one of three flows: orphan mitigation (an earlier
//! bind attempt's outcome is unresolved), unbind (the binding is being
//! deleted and still carries the finalizer), or bind. All durable memory
//! lives in the binding's status; a crash mid-operation resumes from whatever
//! was last persisted there.

pub mod conditions;
pub mod parameters;
pub mod resolve;
pub mod secrets;
pub mod types;

mod bind;
mod orphan;
mod unbind;

pub use types::{Reconciler, ReconcilerError};

use crate::broker::{Outcome, OriginatingIdentity};
use crate::cluster::{ClusterError, EventKind};
use crate::constants::{OSB_ORIGINATING_IDENTITY_PLATFORM, SERVICE_BINDING_FINALIZER};
use crate::crd::{
    ConditionStatus, ServiceBinding, ServiceBindingConditionType, ServiceBindingStatus,
};
use crate::observability::metrics;
use chrono::{SecondsFormat, Utc};
use conditions::set_binding_condition;
use kube::ResourceExt;
use tracing::debug;

impl Reconciler {
    /// Run one reconciliation pass for a binding.
    ///
    /// `Ok` means the pass is done (including terminal failures recorded on
    /// status); `Err` means the pass should be rescheduled by the caller.
    pub async fn reconcile(&self, binding: &ServiceBinding) -> Result<(), ReconcilerError> {
        metrics::increment_reconciliations();
        let name = binding.name_any();

        if binding
            .status
            .as_ref()
            .is_some_and(|s| s.orphan_mitigation_in_progress)
        {
            return self.mitigate_orphan(binding).await;
        }

        if binding.metadata.deletion_timestamp.is_some() {
            return self.reconcile_unbind(binding).await;
        }

        if binding.has_failed_condition() {
            debug!(binding = %name, "skipping: binding has terminally failed");
            return Ok(());
        }

        let generation = binding.metadata.generation.unwrap_or(0);
        let reconciled = binding
            .status
            .as_ref()
            .map_or(0, |s| s.reconciled_generation);
        let ready = binding
            .condition(ServiceBindingConditionType::Ready)
            .is_some_and(|c| c.status == ConditionStatus::True);
        if generation == reconciled && ready {
            debug!(binding = %name, "skipping: generation already reconciled");
            return Ok(());
        }

        // The finalizer must be in place before the first broker call so the
        // broker-side binding can never outlive our chance to delete it.
        let binding = self.status.ensure_finalizer(binding).await?;
        self.reconcile_bind(&binding).await
    }

    /// Persist a binding with the given status, returning the fresh object.
    pub(crate) async fn write_status(
        &self,
        binding: &ServiceBinding,
        status: ServiceBindingStatus,
    ) -> Result<ServiceBinding, ClusterError> {
        let mut updated = binding.clone();
        updated.status = Some(status);
        self.status.update_status(&updated).await
    }

    /// Record a Ready condition update plus a Warning event, for the
    /// pre-flight failures that gate the bind and unbind flows.
    pub(crate) async fn fail_ready(
        &self,
        binding: &ServiceBinding,
        condition_status: ConditionStatus,
        reason: &str,
        message: &str,
    ) -> Result<(), ReconcilerError> {
        let mut status = binding.status.clone().unwrap_or_default();
        set_binding_condition(
            &mut status,
            ServiceBindingConditionType::Ready,
            condition_status,
            reason,
            message,
        );
        self.write_status(binding, status).await?;
        self.events
            .record(binding, EventKind::Warning, reason, message)
            .await;
        Ok(())
    }

    /// Originating identity payload for broker calls, when the feature is on
    /// and the binding recorded who created it.
    pub(crate) fn originating_identity(
        &self,
        binding: &ServiceBinding,
    ) -> Option<OriginatingIdentity> {
        if !self.config.originating_identity_enabled {
            return None;
        }
        let user = binding.spec.user_info.as_ref()?;
        let value = serde_json::to_value(user).ok()?;
        Some(OriginatingIdentity {
            platform: OSB_ORIGINATING_IDENTITY_PLATFORM.to_string(),
            value,
        })
    }

    pub(crate) fn has_finalizer(binding: &ServiceBinding) -> bool {
        binding
            .finalizers()
            .iter()
            .any(|f| f == SERVICE_BINDING_FINALIZER)
    }
}

/// Terminate the recorded operation: the fields that track an in-flight
/// broker call are cleared and the generation is marked processed.
pub(crate) fn clear_current_operation(status: &mut ServiceBindingStatus, generation: i64) {
    status.current_operation = None;
    status.operation_start_time = None;
    status.in_progress_properties = None;
    status.reconciled_generation = generation;
}

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Success => "success",
        Outcome::DefiniteFailure => "definite-failure",
        Outcome::AmbiguousFailure => "ambiguous-failure",
        Outcome::TransportFailure => "transport-failure",
    }
}
