//! # Bind Flow
//!
//! Drives a binding from "requested" to "credentials injected": resolves the
//! catalog references, gates on bindability and instance readiness, stages
//! the operation in status, issues the bind call, and routes the outcome.

use super::conditions::{
    set_binding_condition, MESSAGE_INJECTED_BIND_RESULT, REASON_ASYNC_OPERATION_IN_PROGRESS,
    REASON_BINDING, REASON_BINDING_RETURNED_FAILURE, REASON_BIND_CALL_FAILED,
    REASON_ERROR_FINDING_NAMESPACE, REASON_ERROR_INJECTING_BIND_RESULT,
    REASON_ERROR_WITH_PARAMETERS, REASON_INJECTED_BIND_RESULT, REASON_INSTANCE_NOT_READY,
    REASON_NEEDS_ORPHAN_MITIGATION, REASON_NONBINDABLE_CLASS, REASON_RETRY_TIMEOUT,
};
use super::parameters::BindingParameters;
use super::resolve::{resolve_references, ResolveError};
use super::secrets::materialize_credentials;
use super::{clear_current_operation, now_rfc3339, outcome_label, Reconciler, ReconcilerError};
use crate::broker::{
    classify_broker_error, retry_window_expired, BindRequest, BindResponse, BrokerError, Outcome,
};
use crate::cluster::EventKind;
use crate::crd::{
    ConditionStatus, ServiceBinding, ServiceBindingConditionType, ServiceBindingOperation,
};
use crate::observability::metrics;
use kube::ResourceExt;
use tracing::{debug, info};

impl Reconciler {
    pub(crate) async fn reconcile_bind(
        &self,
        binding: &ServiceBinding,
    ) -> Result<(), ReconcilerError> {
        let namespace = binding.namespace().unwrap_or_default();
        let name = binding.name_any();
        let instance_name = binding.spec.instance_ref.name.clone();

        let refs = match resolve_references(self.resolver.as_ref(), binding).await {
            Ok(refs) => refs,
            Err(ResolveError::Cluster(err)) => return Err(err.into()),
            Err(err @ ResolveError::RefsNotResolved { .. }) => {
                // The upstream resolver has not caught up yet; nothing to
                // record on the binding itself.
                debug!(binding = %name, "waiting for instance references");
                return Err(ReconcilerError::Transient(err.to_string()));
            }
            Err(err) => {
                let message = err.to_string();
                let reason = err.reason().unwrap_or(REASON_BIND_CALL_FAILED);
                self.fail_ready(binding, ConditionStatus::False, reason, &message)
                    .await?;
                return Err(ReconcilerError::Transient(message));
            }
        };

        let bindable = refs.plan.spec.bindable.unwrap_or(refs.class.spec.bindable);
        if !bindable {
            let message = format!(
                "References a non-bindable ClusterServiceClass ({}) and Plan ({}) combination",
                refs.class.spec.external_name, refs.plan.spec.external_name
            );
            self.fail_ready(
                binding,
                ConditionStatus::False,
                REASON_NONBINDABLE_CLASS,
                &message,
            )
            .await?;
            return Ok(());
        }

        if refs
            .instance
            .status
            .as_ref()
            .is_some_and(|s| s.async_op_in_progress)
        {
            let message = format!(
                "Ongoing Asynchronous operation on ServiceInstance {namespace}/{instance_name} \
                 prohibits binding operations"
            );
            self.fail_ready(
                binding,
                ConditionStatus::False,
                REASON_ASYNC_OPERATION_IN_PROGRESS,
                &message,
            )
            .await?;
            return Err(ReconcilerError::Transient(message));
        }

        if !refs.instance.is_ready() {
            let message = format!(
                "ServiceBinding cannot begin because referenced ServiceInstance \
                 {namespace}/{instance_name} is not ready"
            );
            self.fail_ready(
                binding,
                ConditionStatus::False,
                REASON_INSTANCE_NOT_READY,
                &message,
            )
            .await?;
            return Ok(());
        }

        let app_guid = match self.resolver.namespace_uid(&namespace).await {
            Ok(uid) => uid,
            Err(err) => {
                let message = format!("Failed to get namespace {namespace} during binding: {err}");
                self.fail_ready(
                    binding,
                    ConditionStatus::False,
                    REASON_ERROR_FINDING_NAMESPACE,
                    &message,
                )
                .await?;
                return Err(ReconcilerError::Transient(message));
            }
        };

        let parameters = match BindingParameters::build(binding, self.secrets.as_ref()).await {
            Ok(parameters) => parameters,
            Err(err) => {
                let message = format!("Failed to prepare parameters for bind call: {err}");
                self.fail_ready(
                    binding,
                    ConditionStatus::False,
                    REASON_ERROR_WITH_PARAMETERS,
                    &message,
                )
                .await?;
                return Err(ReconcilerError::Transient(message));
            }
        };

        // Stage the operation before the call so a crash between the two is
        // recoverable from status. The start time is only set once; retries
        // of a recorded operation keep the original clock for the deadline.
        let staged_properties = parameters.properties_state();
        let mut binding = binding.clone();
        if binding
            .status
            .as_ref()
            .and_then(|s| s.current_operation)
            .is_none()
        {
            let mut status = binding.status.clone().unwrap_or_default();
            status.current_operation = Some(ServiceBindingOperation::Bind);
            if status.operation_start_time.is_none() {
                status.operation_start_time = Some(now_rfc3339());
            }
            status.in_progress_properties = Some(staged_properties);
            set_binding_condition(
                &mut status,
                ServiceBindingConditionType::Ready,
                ConditionStatus::False,
                REASON_BINDING,
                "The binding is being created",
            );
            binding = self.write_status(&binding, status).await?;
        } else if binding
            .status
            .as_ref()
            .and_then(|s| s.in_progress_properties.as_ref())
            != Some(&staged_properties)
        {
            // The spec changed while the operation was recorded; the staged
            // properties must describe what this pass actually sends.
            let mut status = binding.status.clone().unwrap_or_default();
            status.in_progress_properties = Some(staged_properties);
            binding = self.write_status(&binding, status).await?;
        }

        let request = BindRequest {
            binding_id: binding.spec.external_id.clone(),
            instance_id: refs.instance.spec.external_id.clone(),
            service_id: refs.class.spec.external_id.clone(),
            plan_id: refs.plan.spec.external_id.clone(),
            app_guid: Some(app_guid),
            parameters: parameters.broker_parameters(),
            originating_identity: self.originating_identity(&binding),
        };

        info!(
            binding = %name,
            broker = %refs.class.spec.cluster_service_broker_name,
            "issuing bind call"
        );
        match self.broker.bind(&refs.broker, &request).await {
            Ok(response) => {
                metrics::record_broker_request("bind", "success");
                self.handle_bind_success(&binding, &parameters, &response)
                    .await
            }
            Err(err) => self.handle_bind_failure(&binding, err).await,
        }
    }

    /// The broker accepted the bind. Record that fact, then inject the
    /// credentials; an injection failure is terminal but must not lose the
    /// record that the broker-side resource exists.
    async fn handle_bind_success(
        &self,
        binding: &ServiceBinding,
        parameters: &BindingParameters,
        response: &BindResponse,
    ) -> Result<(), ReconcilerError> {
        let generation = binding.metadata.generation.unwrap_or(0);
        let mut status = binding.status.clone().unwrap_or_default();
        status.external_properties = Some(parameters.properties_state());

        match materialize_credentials(self.secrets.as_ref(), binding, &response.credentials).await {
            Ok(()) => {
                clear_current_operation(&mut status, generation);
                status.orphan_mitigation_in_progress = false;
                set_binding_condition(
                    &mut status,
                    ServiceBindingConditionType::Ready,
                    ConditionStatus::True,
                    REASON_INJECTED_BIND_RESULT,
                    MESSAGE_INJECTED_BIND_RESULT,
                );
                self.write_status(binding, status).await?;
                self.events
                    .record(
                        binding,
                        EventKind::Normal,
                        REASON_INJECTED_BIND_RESULT,
                        MESSAGE_INJECTED_BIND_RESULT,
                    )
                    .await;
                Ok(())
            }
            Err(err) => {
                let message = format!("Error injecting bind results: {err}");
                clear_current_operation(&mut status, generation);
                set_binding_condition(
                    &mut status,
                    ServiceBindingConditionType::Ready,
                    ConditionStatus::False,
                    REASON_ERROR_INJECTING_BIND_RESULT,
                    &message,
                );
                set_binding_condition(
                    &mut status,
                    ServiceBindingConditionType::Failed,
                    ConditionStatus::True,
                    REASON_ERROR_INJECTING_BIND_RESULT,
                    &message,
                );
                self.write_status(binding, status).await?;
                self.events
                    .record(
                        binding,
                        EventKind::Warning,
                        REASON_ERROR_INJECTING_BIND_RESULT,
                        &message,
                    )
                    .await;
                Ok(())
            }
        }
    }

    async fn handle_bind_failure(
        &self,
        binding: &ServiceBinding,
        err: BrokerError,
    ) -> Result<(), ReconcilerError> {
        let generation = binding.metadata.generation.unwrap_or(0);
        let outcome = classify_broker_error(&err);
        metrics::record_broker_request("bind", outcome_label(outcome));
        let mut status = binding.status.clone().unwrap_or_default();

        match outcome {
            // A malformed success response is classified before this point,
            // so Success folds into the definite arm.
            Outcome::Success | Outcome::DefiniteFailure => {
                let ready_message = format!("Bind call failed: {err}");
                let failed_message = format!(
                    "ServiceBroker returned a failure for bind call; \
                     bind operation will not be retried: {err}"
                );
                clear_current_operation(&mut status, generation);
                set_binding_condition(
                    &mut status,
                    ServiceBindingConditionType::Ready,
                    ConditionStatus::False,
                    REASON_BIND_CALL_FAILED,
                    &ready_message,
                );
                set_binding_condition(
                    &mut status,
                    ServiceBindingConditionType::Failed,
                    ConditionStatus::True,
                    REASON_BINDING_RETURNED_FAILURE,
                    &failed_message,
                );
                self.write_status(binding, status).await?;
                self.events
                    .record(
                        binding,
                        EventKind::Warning,
                        REASON_BIND_CALL_FAILED,
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
                    let ready_message = format!("Bind call failed: {err}");
                    let failed_message =
                        "Stopped retrying binding operations because too much time has elapsed";
                    clear_current_operation(&mut status, generation);
                    set_binding_condition(
                        &mut status,
                        ServiceBindingConditionType::Ready,
                        ConditionStatus::False,
                        REASON_BIND_CALL_FAILED,
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
                            REASON_BIND_CALL_FAILED,
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
                    // Operation stays recorded so the retry reuses the
                    // original start time.
                    let message = format!("Bind call failed: {err}");
                    set_binding_condition(
                        &mut status,
                        ServiceBindingConditionType::Ready,
                        ConditionStatus::False,
                        REASON_BIND_CALL_FAILED,
                        &message,
                    );
                    self.write_status(binding, status).await?;
                    self.events
                        .record(binding, EventKind::Warning, REASON_BIND_CALL_FAILED, &message)
                        .await;
                    Err(ReconcilerError::Broker(err))
                }
            }
            Outcome::AmbiguousFailure => {
                let ready_message = format!(
                    "The binding is in an unknown state at the broker \
                     and requires orphan mitigation: {err}"
                );
                let failed_message = format!(
                    "ServiceBroker returned a failure for bind call; \
                     bind operation will not be retried: {err}"
                );
                clear_current_operation(&mut status, generation);
                status.orphan_mitigation_in_progress = true;
                set_binding_condition(
                    &mut status,
                    ServiceBindingConditionType::Ready,
                    ConditionStatus::False,
                    REASON_NEEDS_ORPHAN_MITIGATION,
                    &ready_message,
                );
                set_binding_condition(
                    &mut status,
                    ServiceBindingConditionType::Failed,
                    ConditionStatus::True,
                    REASON_BINDING_RETURNED_FAILURE,
                    &failed_message,
                );
                let updated = self.write_status(binding, status).await?;
                self.events
                    .record(
                        binding,
                        EventKind::Warning,
                        REASON_NEEDS_ORPHAN_MITIGATION,
                        &ready_message,
                    )
                    .await;
                // Compensate in the same pass rather than waiting for the
                // next requeue.
                self.mitigate_orphan(&updated).await
            }
        }
    }
}
