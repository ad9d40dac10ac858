//! # ServiceBinding Spec
//!
//! Main CRD specification types for the binding resource.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ServiceBinding Custom Resource Definition
///
/// A ServiceBinding represents a request for a set of access credentials to a
/// provisioned ServiceInstance. The controller calls the instance's broker to
/// create the binding and materializes the returned credentials into the
/// secret named by `secretName`.
///
/// # Example
///
/// ```yaml
/// apiVersion: servicecatalog.octopilot.io/v1beta1
/// kind: ServiceBinding
/// metadata:
///   name: my-db-binding
///   namespace: default
/// spec:
///   instanceRef:
///     name: my-db
///   externalID: 7aa1d6f5-6008-4b34-a917-96bd2a8fbe21
///   secretName: my-db-credentials
///   parameters:
///     role: readonly
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ServiceBinding",
    group = "servicecatalog.octopilot.io",
    version = "v1beta1",
    namespaced,
    status = "crate::crd::ServiceBindingStatus",
    shortname = "sbi",
    printcolumn = r#"{"name":"Instance", "type":"string", "jsonPath":".spec.instanceRef.name"}"#,
    printcolumn = r#"{"name":"Secret", "type":"string", "jsonPath":".spec.secretName"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBindingSpec {
    /// Reference to the ServiceInstance this binding is for, in the same
    /// namespace as the binding.
    pub instance_ref: LocalObjectReference,
    /// Identity of the binding as sent to the broker. Immutable once set.
    #[serde(rename = "externalID")]
    pub external_id: String,
    /// Name of the secret, in the binding's namespace, that will hold the
    /// credentials returned by the broker.
    pub secret_name: String,
    /// Inline parameters to pass to the broker on bind. Must be a JSON object.
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    /// Parameters sourced from secret keys. Each referenced key must decode
    /// to a JSON object whose fields are merged into the parameters; later
    /// sources win on key collision, and the values are redacted in status.
    #[serde(default)]
    pub parameters_from: Vec<ParametersFromSource>,
    /// Identity of the user that created or last changed the binding.
    /// Propagated to the broker when the originating identity feature is on.
    #[serde(default)]
    pub user_info: Option<UserInfo>,
}

/// Reference to an object in the same namespace.
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
pub struct LocalObjectReference {
    pub name: String,
}

/// A source of parameters held outside the binding's spec.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParametersFromSource {
    /// Secret key holding a JSON object of parameters.
    pub secret_key_ref: SecretKeyReference,
}

/// A reference to a key within a secret.
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
pub struct SecretKeyReference {
    pub name: String,
    pub key: String,
}

/// Caller identity captured when the binding was created.
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub username: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, Vec<String>>,
}
