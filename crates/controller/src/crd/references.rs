//! # Referenced Catalog Resources
//!
//! Read-only views of the catalog objects a ServiceBinding points at: the
//! ServiceInstance in its namespace and the cluster-scoped class, plan, and
//! broker resolved from it. These are reconciled by other controllers; this
//! controller only looks them up.

use serde::{Deserialize, Serialize};

/// ServiceInstance: a provisioned instance of a service offered by a broker.
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ServiceInstance",
    group = "servicecatalog.octopilot.io",
    version = "v1beta1",
    namespaced,
    status = "ServiceInstanceStatus",
    shortname = "si"
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstanceSpec {
    /// External name of the class the instance was provisioned from.
    pub external_service_class_name: String,
    /// External name of the plan the instance was provisioned with.
    pub external_service_plan_name: String,
    /// Identity of the instance as known to the broker.
    #[serde(rename = "externalID")]
    pub external_id: String,
    /// Name of the ClusterServiceClass resource, filled in by the reference
    /// resolution controller. Absent until references are resolved.
    #[serde(default)]
    pub cluster_service_class_ref: Option<String>,
    /// Name of the ClusterServicePlan resource, filled in by the reference
    /// resolution controller. Absent until references are resolved.
    #[serde(default)]
    pub cluster_service_plan_ref: Option<String>,
}

/// Status of a ServiceInstance.
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstanceStatus {
    /// Conditions represent the latest available observations.
    #[serde(default)]
    pub conditions: Vec<ServiceInstanceCondition>,
    /// True while an asynchronous provision/update/deprovision is in flight
    /// at the broker. Bind requests are rejected while set.
    #[serde(default)]
    pub async_op_in_progress: bool,
}

/// Condition reported on a ServiceInstance.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstanceCondition {
    /// Type of condition (Ready, Failed).
    pub r#type: String,
    /// Status of the condition (True, False, Unknown).
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub last_transition_time: Option<String>,
}

impl ServiceInstance {
    /// Whether the instance currently reports `Ready=True`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|status| {
            status
                .conditions
                .iter()
                .any(|c| c.r#type == "Ready" && c.status == "True")
        })
    }
}

/// ClusterServiceClass: an offering in a broker's catalog.
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ClusterServiceClass",
    group = "servicecatalog.octopilot.io",
    version = "v1beta1",
    shortname = "csc"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterServiceClassSpec {
    /// Identity of the class as known to the broker.
    pub external_id: String,
    /// Human-facing name of the class in the broker catalog.
    pub external_name: String,
    /// Name of the ClusterServiceBroker that offers this class.
    pub cluster_service_broker_name: String,
    /// Whether instances of this class may be bound to, unless overridden by
    /// the plan.
    #[serde(default)]
    pub bindable: bool,
    #[serde(default)]
    pub description: Option<String>,
}

/// ClusterServicePlan: a tier of a ClusterServiceClass.
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ClusterServicePlan",
    group = "servicecatalog.octopilot.io",
    version = "v1beta1",
    shortname = "csp"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterServicePlanSpec {
    /// Identity of the plan as known to the broker.
    pub external_id: String,
    /// Human-facing name of the plan in the broker catalog.
    pub external_name: String,
    /// Name of the ClusterServiceBroker that offers this plan.
    pub cluster_service_broker_name: String,
    /// Overrides the class's bindable flag when present.
    #[serde(default)]
    pub bindable: Option<bool>,
}

/// ClusterServiceBroker: endpoint identity of an Open Service Broker.
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ClusterServiceBroker",
    group = "servicecatalog.octopilot.io",
    version = "v1beta1",
    shortname = "csb"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterServiceBrokerSpec {
    /// Base URL of the broker's Open Service Broker API endpoint.
    pub url: String,
}
