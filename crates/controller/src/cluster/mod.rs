//! # Cluster Access
//!
//! Trait seams for everything the reconciler reads from or writes to the
//! cluster. The kube-backed implementations live in [`kube`]; tests swap in
//! in-memory fakes.

pub mod kube;

use crate::crd::{
    ClusterServiceBroker, ClusterServiceClass, ClusterServicePlan, ServiceBinding, ServiceInstance,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use thiserror::Error;

/// Failures from cluster reads and writes.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A write lost an optimistic concurrency race; the reconciler retries
    /// with a fresh observation.
    #[error("conflict writing {kind} {name:?}")]
    Conflict { kind: &'static str, name: String },
    /// The credentials secret exists but is not owned by this binding.
    #[error("secret {name:?} is not owned by this binding")]
    SecretNotOwned { name: String },
    #[error(transparent)]
    Api(#[from] ::kube::Error),
    #[error("{0}")]
    Other(String),
}

/// Read access to the catalog resources a binding points at.
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    async fn service_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceInstance>, ClusterError>;

    async fn cluster_service_class(
        &self,
        name: &str,
    ) -> Result<Option<ClusterServiceClass>, ClusterError>;

    async fn cluster_service_plan(
        &self,
        name: &str,
    ) -> Result<Option<ClusterServicePlan>, ClusterError>;

    async fn cluster_service_broker(
        &self,
        name: &str,
    ) -> Result<Option<ClusterServiceBroker>, ClusterError>;

    /// UID of the binding's namespace, used as the `app_guid` on bind calls.
    async fn namespace_uid(&self, namespace: &str) -> Result<String, ClusterError>;
}

/// Read/write access to secrets in the binding's namespace.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError>;

    async fn create(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError>;

    async fn update(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError>;

    /// Delete a secret. Deleting a secret that does not exist is a no-op.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;
}

/// Write access to the ServiceBinding resource itself.
#[async_trait]
pub trait BindingStatusWriter: Send + Sync {
    /// Persist the binding's status, failing on a resource version conflict
    /// so that stale observations are never written over fresher ones.
    async fn update_status(&self, binding: &ServiceBinding)
        -> Result<ServiceBinding, ClusterError>;

    /// Add the controller's finalizer if it is not already present.
    async fn ensure_finalizer(
        &self,
        binding: &ServiceBinding,
    ) -> Result<ServiceBinding, ClusterError>;

    /// Remove the controller's finalizer, releasing the binding for deletion.
    async fn remove_finalizer(&self, binding: &ServiceBinding) -> Result<(), ClusterError>;
}

/// Severity of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Normal,
    Warning,
}

/// Emits Kubernetes events on the binding. Best effort; failures are logged
/// and never fail a reconciliation.
#[async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record(&self, binding: &ServiceBinding, kind: EventKind, reason: &str, message: &str);
}
