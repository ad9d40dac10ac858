//! # ServiceBinding Status
//!
//! Status types for tracking the binding's reconciliation state. The status
//! is the only durable memory of a possibly multi-pass operation: a process
//! restart mid-operation resumes from whatever was last persisted here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of the ServiceBinding resource.
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingStatus {
    /// Conditions represent the latest available observations.
    #[serde(default)]
    pub conditions: Vec<ServiceBindingCondition>,
    /// The operation currently in flight against the broker, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_operation: Option<ServiceBindingOperation>,
    /// When the current operation was first attempted (RFC3339). Set once
    /// when the operation begins and preserved across retries; cleared when
    /// the operation terminates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_start_time: Option<String>,
    /// The last spec generation that was fully processed.
    #[serde(default)]
    pub reconciled_generation: i64,
    /// Properties staged for the in-flight broker call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_progress_properties: Option<ServiceBindingPropertiesState>,
    /// Properties last confirmed accepted by the broker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_properties: Option<ServiceBindingPropertiesState>,
    /// True while a bind attempt's outcome is unresolved and a compensating
    /// unbind still has to succeed.
    #[serde(default)]
    pub orphan_mitigation_in_progress: bool,
}

/// The operations that may be in flight against the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ServiceBindingOperation {
    Bind,
    Unbind,
}

/// Condition types reported on a ServiceBinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ServiceBindingConditionType {
    /// The binding's credentials have been injected and are usable.
    Ready,
    /// The binding has terminally failed and will not be retried.
    Failed,
}

/// Status values a condition may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Condition represents an observation of the binding's state.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingCondition {
    /// Type of condition.
    pub r#type: ServiceBindingConditionType,
    /// Status of the condition.
    pub status: ConditionStatus,
    /// Last time the status (not the reason or message) changed (RFC3339).
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Machine-readable reason for the condition's last transition.
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message describing the condition.
    #[serde(default)]
    pub message: Option<String>,
}

/// Parameters and checksum staged for, or confirmed by, a broker call.
///
/// The parameters map is the status-visible copy with secret-sourced values
/// redacted; the checksum is computed over the real values so drift can be
/// detected without persisting secret contents.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingPropertiesState {
    /// Redacted copy of the merged parameters, if any were sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<BTreeMap<String, serde_json::Value>>,
    /// Canonical SHA-256 digest of the unredacted merged parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_checksum: Option<String>,
}

impl crate::crd::ServiceBinding {
    /// Look up a condition by type.
    #[must_use]
    pub fn condition(
        &self,
        condition_type: ServiceBindingConditionType,
    ) -> Option<&ServiceBindingCondition> {
        self.status
            .as_ref()?
            .conditions
            .iter()
            .find(|c| c.r#type == condition_type)
    }

    /// Whether the binding carries a terminal `Failed=True` condition.
    #[must_use]
    pub fn has_failed_condition(&self) -> bool {
        self.condition(ServiceBindingConditionType::Failed)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }
}
