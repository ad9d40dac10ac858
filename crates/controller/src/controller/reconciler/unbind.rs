//! # Unbind Flow
//!
//! Handles a binding being deleted: the credentials secret is removed, the
//! broker-side binding is deleted with the original correlation IDs, and the
//! finalizer is released once the broker confirms.

use super::conditions::{
    set_binding_condition, MESSAGE_UNBOUND, REASON_ERROR_EJECTING_BINDING, REASON_RETRY_TIMEOUT,
    REASON_UNBINDING, REASON_UNBIND_CALL_FAILED, REASON_UNBOUND,
};
use super::resolve::{resolve_references, ResolveError};
use super::secrets::delete_credentials;
use super::{clear_current_operation, now_rfc3339, outcome_label, Reconciler, ReconcilerError};
use crate::broker::{classify_broker_error, retry_window_expired, BrokerError, Outcome, UnbindRequest};
use crate::cluster::EventKind;
use crate::crd::{
    ConditionStatus, ServiceBinding, ServiceBindingConditionType, ServiceBindingOperation,
};
use crate::observability::metrics;
use kube::ResourceExt;
use tracing::{debug, info};

impl Reconciler {
    pub(crate) async fn reconcile_unbind(
        &self,
        binding: &ServiceBinding,
    ) -> Result<(), ReconcilerError> {
        let name = binding.name_any();
        if !Self::has_finalizer(binding) {
            debug!(binding = %name, "deletion already released, nothing to do");
            return Ok(());
        }

        let recorded = binding.status.clone().unwrap_or_default();

        // Nothing was ever created at the broker; release the binding.
        if recorded.external_properties.is_none() && recorded.current_operation.is_none() {
            delete_credentials(self.secrets.as_ref(), binding).await?;
            self.status.remove_finalizer(binding).await?;
            return Ok(());
        }

        // A previous unbind attempt failed terminally; the finalizer stays
        // until an operator intervenes. A Failed condition left by a bind
        // attempt does not block the unbind while the broker may still hold
        // the binding.
        let unbind_failed_terminally = binding
            .condition(ServiceBindingConditionType::Failed)
            .filter(|c| c.status == ConditionStatus::True)
            .and_then(|c| c.reason.as_deref())
            .is_some_and(|reason| {
                reason == REASON_UNBIND_CALL_FAILED || reason == REASON_RETRY_TIMEOUT
            });
        if unbind_failed_terminally && recorded.current_operation.is_none() {
            debug!(binding = %name, "skipping: unbind has terminally failed");
            return Ok(());
        }

        let refs = match resolve_references(self.resolver.as_ref(), binding).await {
            Ok(refs) => refs,
            Err(ResolveError::Cluster(err)) => return Err(err.into()),
            Err(err @ ResolveError::RefsNotResolved { .. }) => {
                return Err(ReconcilerError::Transient(err.to_string()));
            }
            Err(err) => {
                let message = err.to_string();
                let reason = err.reason().unwrap_or(REASON_UNBIND_CALL_FAILED);
                self.fail_ready(binding, ConditionStatus::False, reason, &message)
                    .await?;
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
            set_binding_condition(
                &mut status,
                ServiceBindingConditionType::Ready,
                ConditionStatus::False,
                REASON_UNBINDING,
                "The binding is being deleted",
            );
            binding = self.write_status(&binding, status).await?;
        }

        // The secret goes first so no consumer keeps credentials the broker
        // is about to revoke.
        if let Err(err) = delete_credentials(self.secrets.as_ref(), &binding).await {
            let message = format!("Error deleting secret: {err}");
            self.fail_ready(
                &binding,
                ConditionStatus::False,
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

        info!(
            binding = %name,
            broker = %refs.class.spec.cluster_service_broker_name,
            "issuing unbind call"
        );
        match self.broker.unbind(&refs.broker, &request).await {
            Ok(()) => {
                metrics::record_broker_request("unbind", "success");
                let generation = binding.metadata.generation.unwrap_or(0);
                let mut status = binding.status.clone().unwrap_or_default();
                clear_current_operation(&mut status, generation);
                status.external_properties = None;
                status.orphan_mitigation_in_progress = false;
                set_binding_condition(
                    &mut status,
                    ServiceBindingConditionType::Ready,
                    ConditionStatus::False,
                    REASON_UNBOUND,
                    MESSAGE_UNBOUND,
                );
                self.write_status(&binding, status).await?;
                self.status.remove_finalizer(&binding).await?;
                self.events
                    .record(&binding, EventKind::Normal, REASON_UNBOUND, MESSAGE_UNBOUND)
                    .await;
                Ok(())
            }
            Err(err) => self.handle_unbind_failure(&binding, err).await,
        }
    }

    async fn handle_unbind_failure(
        &self,
        binding: &ServiceBinding,
        err: BrokerError,
    ) -> Result<(), ReconcilerError> {
        let generation = binding.metadata.generation.unwrap_or(0);
        let outcome = classify_broker_error(&err);
        metrics::record_broker_request("unbind", outcome_label(outcome));
        let mut status = binding.status.clone().unwrap_or_default();

        match outcome {
            // Unbind is never compensated, so an ambiguous rejection is as
            // terminal as a definite one.
            Outcome::Success | Outcome::DefiniteFailure | Outcome::AmbiguousFailure => {
                let ready_message = format!("Unbind call failed: {err}");
                let failed_message = format!(
                    "ServiceBroker returned a failure for unbind call; \
                     unbind operation will not be retried: {err}"
                );
                clear_current_operation(&mut status, generation);
                set_binding_condition(
                    &mut status,
                    ServiceBindingConditionType::Ready,
                    ConditionStatus::False,
                    REASON_UNBIND_CALL_FAILED,
                    &ready_message,
                );
                set_binding_condition(
                    &mut status,
                    ServiceBindingConditionType::Failed,
                    ConditionStatus::True,
                    REASON_UNBIND_CALL_FAILED,
                    &failed_message,
                );
                self.write_status(binding, status).await?;
                self.events
                    .record(
                        binding,
                        EventKind::Warning,
                        REASON_UNBIND_CALL_FAILED,
                        &ready_message,
                    )
                    .await;
                Ok(())
            }
            Outcome::TransportFailure => {
                let expired = retry_window_expired(
                    status.operation_start_time.as_deref(),
                    self.config.reconciliation_retry_duration,
                );
                if expired {
                    let ready_message = format!("Unbind call failed: {err}");
                    let failed_message =
                        "Stopped retrying unbind operations because too much time has elapsed";
                    clear_current_operation(&mut status, generation);
                    set_binding_condition(
                        &mut status,
                        ServiceBindingConditionType::Ready,
                        ConditionStatus::False,
                        REASON_UNBIND_CALL_FAILED,
                        &ready_message,
                    );
                    set_binding_condition(
                        &mut status,
                        ServiceBindingConditionType::Failed,
                        ConditionStatus::True,
                        REASON_RETRY_TIMEOUT,
                        failed_message,
                    );
                    self.write_status(binding, status).await?;
                    self.events
                        .record(
                            binding,
                            EventKind::Warning,
                            REASON_UNBIND_CALL_FAILED,
                            &ready_message,
                        )
                        .await;
                    self.events
                        .record(
                            binding,
                            EventKind::Warning,
                            REASON_RETRY_TIMEOUT,
                            failed_message,
                        )
                        .await;
                    Ok(())
                } else {
                    let message = format!("Unbind call failed: {err}");
                    set_binding_condition(
                        &mut status,
                        ServiceBindingConditionType::Ready,
                        ConditionStatus::False,
                        REASON_UNBIND_CALL_FAILED,
                        &message,
                    );
                    self.write_status(binding, status).await?;
                    self.events
                        .record(
                            binding,
                            EventKind::Warning,
                            REASON_UNBIND_CALL_FAILED,
                            &message,
                        )
                        .await;
                    Err(ReconcilerError::Broker(err))
                }
            }
        }
    }
}
