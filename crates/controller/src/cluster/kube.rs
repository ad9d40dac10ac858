//! # Kube-backed Cluster Access
//!
//! Implementations of the cluster traits on top of `kube::Client`.

use super::{BindingStatusWriter, ClusterError, EventKind, EventRecorder, ReferenceResolver,
    SecretStore};
use crate::constants::SERVICE_BINDING_FINALIZER;
use crate::crd::{
    ClusterServiceBroker, ClusterServiceClass, ClusterServicePlan, ServiceBinding, ServiceInstance,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource, ResourceExt};
use serde_json::json;
use tracing::warn;

/// [`ReferenceResolver`] backed by the API server.
#[derive(Clone)]
pub struct KubeReferenceResolver {
    client: Client,
}

impl KubeReferenceResolver {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReferenceResolver for KubeReferenceResolver {
    async fn service_instance(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceInstance>, ClusterError> {
        let api: Api<ServiceInstance> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn cluster_service_class(
        &self,
        name: &str,
    ) -> Result<Option<ClusterServiceClass>, ClusterError> {
        let api: Api<ClusterServiceClass> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn cluster_service_plan(
        &self,
        name: &str,
    ) -> Result<Option<ClusterServicePlan>, ClusterError> {
        let api: Api<ClusterServicePlan> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn cluster_service_broker(
        &self,
        name: &str,
    ) -> Result<Option<ClusterServiceBroker>, ClusterError> {
        let api: Api<ClusterServiceBroker> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn namespace_uid(&self, namespace: &str) -> Result<String, ClusterError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = api.get(namespace).await?;
        ns.metadata
            .uid
            .ok_or_else(|| ClusterError::Other(format!("namespace {namespace:?} has no uid")))
    }
}

/// [`SecretStore`] backed by the API server.
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    async fn create(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError> {
        self.api(namespace)
            .create(&PostParams::default(), secret)
            .await?;
        Ok(())
    }

    async fn update(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError> {
        let name = secret.name_any();
        self.api(namespace)
            .replace(&name, &PostParams::default(), secret)
            .await
            .map_err(|err| conflict_or_api("Secret", &name, err))?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        match self.api(namespace).delete(name, &Default::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(response)) if response.code == 404 => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// [`BindingStatusWriter`] backed by the API server.
#[derive(Clone)]
pub struct KubeBindingStatusWriter {
    client: Client,
}

impl KubeBindingStatusWriter {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<ServiceBinding> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl BindingStatusWriter for KubeBindingStatusWriter {
    async fn update_status(
        &self,
        binding: &ServiceBinding,
    ) -> Result<ServiceBinding, ClusterError> {
        let name = binding.name_any();
        let namespace = binding.namespace().unwrap_or_default();
        let data = serde_json::to_vec(binding)
            .map_err(|err| ClusterError::Other(err.to_string()))?;
        self.api(&namespace)
            .replace_status(&name, &PostParams::default(), data)
            .await
            .map_err(|err| conflict_or_api("ServiceBinding", &name, err))
    }

    async fn ensure_finalizer(
        &self,
        binding: &ServiceBinding,
    ) -> Result<ServiceBinding, ClusterError> {
        if binding
            .finalizers()
            .iter()
            .any(|f| f == SERVICE_BINDING_FINALIZER)
        {
            return Ok(binding.clone());
        }
        let name = binding.name_any();
        let namespace = binding.namespace().unwrap_or_default();
        let mut finalizers: Vec<String> = binding.finalizers().to_vec();
        finalizers.push(SERVICE_BINDING_FINALIZER.to_string());
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        self.api(&namespace)
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|err| conflict_or_api("ServiceBinding", &name, err))
    }

    async fn remove_finalizer(&self, binding: &ServiceBinding) -> Result<(), ClusterError> {
        let name = binding.name_any();
        let namespace = binding.namespace().unwrap_or_default();
        let finalizers: Vec<&String> = binding
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != SERVICE_BINDING_FINALIZER)
            .collect();
        let patch = json!({ "metadata": { "finalizers": finalizers } });
        self.api(&namespace)
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|err| conflict_or_api("ServiceBinding", &name, err))?;
        Ok(())
    }
}

/// [`EventRecorder`] publishing Kubernetes events on the binding.
#[derive(Clone)]
pub struct KubeEventRecorder {
    recorder: Recorder,
}

impl KubeEventRecorder {
    #[must_use]
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: "service-binding-controller".into(),
            instance: None,
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventRecorder for KubeEventRecorder {
    async fn record(&self, binding: &ServiceBinding, kind: EventKind, reason: &str, message: &str) {
        let event = Event {
            type_: match kind {
                EventKind::Normal => EventType::Normal,
                EventKind::Warning => EventType::Warning,
            },
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: "Reconcile".to_string(),
            secondary: None,
        };
        let reference = binding.object_ref(&());
        if let Err(err) = self.recorder.publish(&event, &reference).await {
            warn!(error = %err, reason, "failed to publish event");
        }
    }
}

fn conflict_or_api(kind: &'static str, name: &str, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(ref response) if response.code == 409 => ClusterError::Conflict {
            kind,
            name: name.to_string(),
        },
        other => other.into(),
    }
}
