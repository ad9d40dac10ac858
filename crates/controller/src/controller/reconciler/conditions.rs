//! # Condition Management
//!
//! Setting conditions on a binding's status while keeping the transition
//! timestamp honest: `lastTransitionTime` moves iff the condition's status
//! value changes, never on reason or message churn.

use crate::crd::{
    ConditionStatus, ServiceBindingCondition, ServiceBindingConditionType, ServiceBindingStatus,
};
use chrono::{DateTime, SecondsFormat, Utc};

// Condition reasons. The vocabulary is part of the controller's public
// surface; consumers key automation off these strings.
pub const REASON_REFERENCED_NON_EXISTENT_INSTANCE: &str = "ReferencedNonExistentInstance";
pub const REASON_REFERENCED_NON_EXISTENT_CLASS: &str = "ReferencedNonExistentServiceClass";
pub const REASON_REFERENCED_NON_EXISTENT_PLAN: &str = "ReferencedNonExistentServicePlan";
pub const REASON_REFERENCED_NON_EXISTENT_BROKER: &str = "ReferencedNonExistentBroker";
pub const REASON_NONBINDABLE_CLASS: &str = "ErrorNonbindableServiceClass";
pub const REASON_ASYNC_OPERATION_IN_PROGRESS: &str = "ErrorAsyncOperationInProgress";
pub const REASON_INSTANCE_NOT_READY: &str = "ErrorInstanceNotReady";
pub const REASON_ERROR_FINDING_NAMESPACE: &str = "ErrorFindingNamespaceForInstance";
pub const REASON_ERROR_WITH_PARAMETERS: &str = "ErrorWithParameters";
pub const REASON_BINDING: &str = "Binding";
pub const REASON_UNBINDING: &str = "Unbinding";
pub const REASON_BIND_CALL_FAILED: &str = "BindCallFailed";
pub const REASON_UNBIND_CALL_FAILED: &str = "UnbindCallFailed";
pub const REASON_BINDING_RETURNED_FAILURE: &str = "ServiceBindingReturnedFailure";
pub const REASON_RETRY_TIMEOUT: &str = "ErrorReconciliationRetryTimeout";
pub const REASON_ERROR_INJECTING_BIND_RESULT: &str = "ErrorInjectingBindResult";
pub const REASON_INJECTED_BIND_RESULT: &str = "InjectedBindResult";
pub const REASON_UNBOUND: &str = "UnboundSuccessfully";
pub const REASON_ERROR_EJECTING_BINDING: &str = "ErrorEjectingServiceBinding";
pub const REASON_NEEDS_ORPHAN_MITIGATION: &str = "ServiceBindingNeedsOrphanMitigation";
pub const REASON_ORPHAN_MITIGATION_SUCCESSFUL: &str = "OrphanMitigationSuccessful";

pub const MESSAGE_INJECTED_BIND_RESULT: &str = "Injected bind result";
pub const MESSAGE_UNBOUND: &str = "This binding was deleted successfully";

/// Set a condition on the status, stamping the transition time with the
/// current wall clock when the status value changes.
pub fn set_binding_condition(
    status: &mut ServiceBindingStatus,
    condition_type: ServiceBindingConditionType,
    condition_status: ConditionStatus,
    reason: &str,
    message: &str,
) {
    set_binding_condition_at(
        status,
        condition_type,
        condition_status,
        reason,
        message,
        Utc::now(),
    );
}

fn set_binding_condition_at(
    status: &mut ServiceBindingStatus,
    condition_type: ServiceBindingConditionType,
    condition_status: ConditionStatus,
    reason: &str,
    message: &str,
    now: DateTime<Utc>,
) {
    let transition_time = Some(now.to_rfc3339_opts(SecondsFormat::Secs, true));
    match status
        .conditions
        .iter_mut()
        .find(|c| c.r#type == condition_type)
    {
        Some(existing) => {
            if existing.status != condition_status {
                existing.last_transition_time = transition_time;
            }
            existing.status = condition_status;
            existing.reason = Some(reason.to_string());
            existing.message = Some(message.to_string());
        }
        None => status.conditions.push(ServiceBindingCondition {
            r#type: condition_type,
            status: condition_status,
            last_transition_time: transition_time,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }),
    }
}
