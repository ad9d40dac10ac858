//! # Orphan Mitigation
//!
//! Compensates a bind attempt whose outcome at the broker is unknown: the
//! broker may or may not hold a binding, so an unbind with the original
//! correlation IDs is issued until one succeeds. Mitigation has no retry
//! deadline; the flag only clears on a confirmed unbind.

use super::conditions::{
    set_binding_condition, REASON_ERROR_EJECTING_BINDING, REASON_ORPHAN_MITIGATION_SUCCESSFUL,
    REASON_UNBIND_CALL_FAILED,
};
use super::resolve::{resolve_references, ResolveError};
use super::secrets::delete_credentials;
use super::{now_rfc3339, Reconciler, ReconcilerError};
use crate::broker::UnbindRequest;
use crate::cluster::EventKind;
use crate::crd::{
    ConditionStatus, ServiceBinding, ServiceBindingConditionType, ServiceBindingOperation,
};
use crate::observability::metrics;
use kube::ResourceExt;
use tracing::info;

const MESSAGE_MITIGATED: &str = "Orphan mitigation was completed successfully";

impl Reconciler {
    pub(crate) async fn mitigate_orphan(
        &self,
        binding: &ServiceBinding,
    ) -> Result<(), ReconcilerError> {
        metrics::increment_orphan_mitigations();
        let name = binding.name_any();
        info!(binding = %name, "performing orphan mitigation");

        let refs = match resolve_references(self.resolver.as_ref(), binding).await {
            Ok(refs) => refs,
            Err(ResolveError::Cluster(err)) => return Err(err.into()),
            Err(err) => {
                // Mitigation cannot run without the correlation IDs; keep
                // the flag and come back. The condition write and event are
                // skipped once this reason is already on status, so a stuck
                // chain does not flood the event stream on every requeue.
                let message = err.to_string();
                let reason = err.reason().unwrap_or(REASON_UNBIND_CALL_FAILED);
                let already_reported = binding
                    .condition(ServiceBindingConditionType::Ready)
                    .is_some_and(|c| {
                        c.status == ConditionStatus::Unknown && c.reason.as_deref() == Some(reason)
                    });
                if !already_reported {
                    self.fail_ready(binding, ConditionStatus::Unknown, reason, &message)
                        .await?;
                }
                return Err(ReconcilerError::Transient(message));
            }
        };

        let mut binding = binding.clone();
        if binding
            .status
            .as_ref()
            .and_then(|s| s.current_operation)
            .is_none()
        {
            let mut status = binding.status.clone().unwrap_or_default();
            status.current_operation = Some(ServiceBindingOperation::Unbind);
            if status.operation_start_time.is_none() {
                status.operation_start_time = Some(now_rfc3339());
            }
            binding = self.write_status(&binding, status).await?;
        }

        if let Err(err) = delete_credentials(self.secrets.as_ref(), &binding).await {
            let message = format!("Error deleting secret during orphan mitigation: {err}");
            self.fail_ready(
                &binding,
                ConditionStatus::Unknown,
                REASON_ERROR_EJECTING_BINDING,
                &message,
            )
            .await?;
            return Err(ReconcilerError::Transient(message));
        }

        let request = UnbindRequest {
            binding_id: binding.spec.external_id.clone(),
            instance_id: refs.instance.spec.external_id.clone(),
            service_id: refs.class.spec.external_id.clone(),
            plan_id: refs.plan.spec.external_id.clone(),
            originating_identity: self.originating_identity(&binding),
        };

        match self.broker.unbind(&refs.broker, &request).await {
            Ok(()) => {
                metrics::record_broker_request("unbind", "success");
                metrics::increment_orphan_mitigation_successes();
                let mut status = binding.status.clone().unwrap_or_default();
                status.orphan_mitigation_in_progress = false;
                status.current_operation = None;
                status.operation_start_time = None;
                status.in_progress_properties = None;
                status.external_properties = None;
                set_binding_condition(
                    &mut status,
                    ServiceBindingConditionType::Ready,
                    ConditionStatus::False,
                    REASON_ORPHAN_MITIGATION_SUCCESSFUL,
                    MESSAGE_MITIGATED,
                );
                self.write_status(&binding, status).await?;
                self.events
                    .record(
                        &binding,
                        EventKind::Normal,
                        REASON_ORPHAN_MITIGATION_SUCCESSFUL,
                        MESSAGE_MITIGATED,
                    )
                    .await;
                Ok(())
            }
            Err(err) => {
                metrics::record_broker_request("unbind", "failure");
                // No deadline applies here; the state at the broker stays
                // unknown until an unbind is confirmed.
                let message = format!("Unbind call failed: {err}");
                self.fail_ready(
                    &binding,
                    ConditionStatus::Unknown,
                    REASON_UNBIND_CALL_FAILED,
                    &message,
                )
                .await?;
                Err(ReconcilerError::Broker(err))
            }
        }
    }
}
