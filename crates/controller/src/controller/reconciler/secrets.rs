//! # Secret Materializer
//!
//! Writes the credentials a bind call returned into the secret named by the
//! binding's spec, refusing to touch a secret the binding does not own.

use crate::cluster::{ClusterError, SecretStore};
use crate::crd::ServiceBinding;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

/// Create or update the credentials secret for a binding.
///
/// String credential values are stored as their raw bytes; everything else is
/// stored as its JSON encoding. An existing secret is only overwritten when
/// it carries this binding's controller owner reference.
pub async fn materialize_credentials(
    store: &dyn SecretStore,
    binding: &ServiceBinding,
    credentials: &BTreeMap<String, serde_json::Value>,
) -> Result<(), ClusterError> {
    let namespace = binding.namespace().unwrap_or_default();
    let name = binding.spec.secret_name.clone();

    let mut data = BTreeMap::new();
    for (key, value) in credentials {
        let bytes = match value {
            serde_json::Value::String(s) => s.clone().into_bytes(),
            other => serde_json::to_vec(other)
                .map_err(|err| ClusterError::Other(err.to_string()))?,
        };
        data.insert(key.clone(), ByteString(bytes));
    }

    let mut secret = Secret {
        data: Some(data),
        ..Secret::default()
    };
    secret.metadata.name = Some(name.clone());
    secret.metadata.namespace = Some(namespace.clone());
    secret.metadata.owner_references = Some(vec![controller_owner_reference(binding)]);

    match store.get(&namespace, &name).await? {
        Some(existing) => {
            if !owned_by(&existing, binding) {
                return Err(ClusterError::SecretNotOwned { name });
            }
            secret.metadata.resource_version = existing.metadata.resource_version.clone();
            store.update(&namespace, &secret).await
        }
        None => store.create(&namespace, &secret).await,
    }
}

/// Delete the credentials secret. Not-found is tolerated so deletion is
/// idempotent across retries.
pub async fn delete_credentials(
    store: &dyn SecretStore,
    binding: &ServiceBinding,
) -> Result<(), ClusterError> {
    let namespace = binding.namespace().unwrap_or_default();
    store.delete(&namespace, &binding.spec.secret_name).await
}

fn controller_owner_reference(binding: &ServiceBinding) -> OwnerReference {
    OwnerReference {
        api_version: ServiceBinding::api_version(&()).into_owned(),
        kind: ServiceBinding::kind(&()).into_owned(),
        name: binding.name_any(),
        uid: binding.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

fn owned_by(secret: &Secret, binding: &ServiceBinding) -> bool {
    let Some(uid) = binding.uid() else {
        return false;
    };
    secret
        .metadata
        .owner_references
        .as_ref()
        .is_some_and(|refs| {
            refs.iter()
                .any(|r| r.uid == uid && r.controller.unwrap_or(false))
        })
}
