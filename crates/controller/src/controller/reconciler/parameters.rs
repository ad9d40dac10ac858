//! # Parameter Builder
//!
//! Merges a binding's inline parameters with the secret-sourced ones, keeps
//! track of which keys came from secrets so they can be redacted in status,
//! and produces a checksum of the real values for drift detection.

use crate::cluster::{ClusterError, SecretStore};
use crate::crd::{ServiceBinding, ServiceBindingPropertiesState};
use kube::ResourceExt;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Placeholder stored in status for values that came from a secret.
const REDACTED: &str = "<redacted>";

#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("inline parameters are not a JSON object")]
    InlineNotObject,
    #[error("secret {name:?} referenced by parametersFrom does not exist")]
    SourceSecretMissing { name: String },
    #[error("key {key:?} not found in secret {name:?}")]
    SourceKeyMissing { name: String, key: String },
    #[error("key {key:?} in secret {name:?} is not a JSON object: {detail}")]
    SourceNotObject {
        name: String,
        key: String,
        detail: String,
    },
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// The merged bind parameters for one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct BindingParameters {
    merged: BTreeMap<String, serde_json::Value>,
    secret_sourced: BTreeSet<String>,
}

impl BindingParameters {
    /// Build the merged parameters for a binding: the inline object first,
    /// then each `parametersFrom` source in declaration order. Later sources
    /// overwrite earlier values on key collision, and any key whose final
    /// value came from a secret is tracked for redaction.
    pub async fn build(
        binding: &ServiceBinding,
        secrets: &dyn SecretStore,
    ) -> Result<Self, ParameterError> {
        let namespace = binding.namespace().unwrap_or_default();
        let mut params = Self::default();

        if let Some(inline) = &binding.spec.parameters {
            let object = inline
                .as_object()
                .ok_or(ParameterError::InlineNotObject)?;
            for (key, value) in object {
                params.merged.insert(key.clone(), value.clone());
            }
        }

        for source in &binding.spec.parameters_from {
            let reference = &source.secret_key_ref;
            let secret = secrets
                .get(&namespace, &reference.name)
                .await?
                .ok_or_else(|| ParameterError::SourceSecretMissing {
                    name: reference.name.clone(),
                })?;
            let payload = secret
                .data
                .as_ref()
                .and_then(|data| data.get(&reference.key))
                .ok_or_else(|| ParameterError::SourceKeyMissing {
                    name: reference.name.clone(),
                    key: reference.key.clone(),
                })?;
            let value: serde_json::Value =
                serde_json::from_slice(&payload.0).map_err(|err| {
                    ParameterError::SourceNotObject {
                        name: reference.name.clone(),
                        key: reference.key.clone(),
                        detail: err.to_string(),
                    }
                })?;
            let object = value
                .as_object()
                .ok_or_else(|| ParameterError::SourceNotObject {
                    name: reference.name.clone(),
                    key: reference.key.clone(),
                    detail: "expected a JSON object".to_string(),
                })?;
            for (key, value) in object {
                params.merged.insert(key.clone(), value.clone());
                params.secret_sourced.insert(key.clone());
            }
        }

        Ok(params)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    /// The real merged values to send to the broker. `None` when no
    /// parameters were specified at all.
    #[must_use]
    pub fn broker_parameters(&self) -> Option<BTreeMap<String, serde_json::Value>> {
        if self.is_empty() {
            None
        } else {
            Some(self.merged.clone())
        }
    }

    /// Status-safe copy with secret-sourced values replaced by a placeholder.
    #[must_use]
    pub fn redacted(&self) -> Option<BTreeMap<String, serde_json::Value>> {
        if self.is_empty() {
            return None;
        }
        Some(
            self.merged
                .iter()
                .map(|(key, value)| {
                    let shown = if self.secret_sourced.contains(key) {
                        serde_json::Value::String(REDACTED.to_string())
                    } else {
                        value.clone()
                    };
                    (key.clone(), shown)
                })
                .collect(),
        )
    }

    /// Hex SHA-256 over the canonical JSON encoding of the unredacted merge.
    /// `BTreeMap` serialization is key-sorted, which makes the encoding
    /// canonical without extra work.
    #[must_use]
    pub fn checksum(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        let canonical =
            serde_json::to_string(&self.merged).unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        Some(format!("{digest:x}"))
    }

    /// The properties block persisted in status for this merge.
    #[must_use]
    pub fn properties_state(&self) -> ServiceBindingPropertiesState {
        ServiceBindingPropertiesState {
            parameters: self.redacted(),
            parameters_checksum: self.checksum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(
        pairs: &[(&str, serde_json::Value)],
        secret_keys: &[&str],
    ) -> BindingParameters {
        BindingParameters {
            merged: pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), v.clone()))
                .collect(),
            secret_sourced: secret_keys.iter().map(|k| (*k).to_string()).collect(),
        }
    }

    #[test]
    fn empty_parameters_produce_nothing() {
        let empty = BindingParameters::default();
        assert!(empty.broker_parameters().is_none());
        assert!(empty.redacted().is_none());
        assert!(empty.checksum().is_none());
    }

    #[test]
    fn secret_sourced_values_are_redacted() {
        let built = params(&[("a", json!("1")), ("b", json!("2"))], &["b"]);
        let redacted = built.redacted().expect("parameters present");
        assert_eq!(redacted["a"], json!("1"));
        assert_eq!(redacted["b"], json!("<redacted>"));
        let broker = built.broker_parameters().expect("parameters present");
        assert_eq!(broker["b"], json!("2"));
    }

    #[test]
    fn checksum_covers_real_values_and_is_order_independent() {
        let one = params(&[("a", json!("1")), ("b", json!("2"))], &["b"]);
        let two = params(&[("b", json!("2")), ("a", json!("1"))], &[]);
        // redaction never feeds the checksum
        assert_eq!(one.checksum(), two.checksum());

        let changed = params(&[("a", json!("1")), ("b", json!("3"))], &["b"]);
        assert_ne!(one.checksum(), changed.checksum());
    }

    #[test]
    fn checksum_is_stable_hex_sha256() {
        let built = params(&[("a", json!("1"))], &[]);
        let checksum = built.checksum().expect("parameters present");
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
