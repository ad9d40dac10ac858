//! Shared test harness: in-memory fakes for every cluster and broker seam,
//! plus builders for the catalog objects a binding needs.

#![allow(dead_code)]

use async_trait::async_trait;
use controller::broker::{
    BindRequest, BindResponse, BrokerClient, BrokerError, UnbindRequest,
};
use controller::cluster::{
    BindingStatusWriter, ClusterError, EventKind, EventRecorder, ReferenceResolver, SecretStore,
};
use controller::config::ControllerConfig;
use controller::constants::SERVICE_BINDING_FINALIZER;
use controller::controller::reconciler::Reconciler;
use controller::crd::{
    ClusterServiceBroker, ClusterServiceBrokerSpec, ClusterServiceClass, ClusterServiceClassSpec,
    ClusterServicePlan, ClusterServicePlanSpec, ServiceBinding, ServiceBindingSpec,
    ServiceInstance, ServiceInstanceCondition, ServiceInstanceSpec, ServiceInstanceStatus,
};
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "test-ns";
pub const BINDING_NAME: &str = "test-binding";
pub const BINDING_UID: &str = "binding-uid";
pub const BINDING_EXTERNAL_ID: &str = "binding-external-id";
pub const INSTANCE_NAME: &str = "test-instance";
pub const INSTANCE_EXTERNAL_ID: &str = "instance-external-id";
pub const CLASS_NAME: &str = "test-class";
pub const CLASS_EXTERNAL_ID: &str = "class-external-id";
pub const PLAN_NAME: &str = "test-plan";
pub const PLAN_EXTERNAL_ID: &str = "plan-external-id";
pub const BROKER_NAME: &str = "test-broker";
pub const SECRET_NAME: &str = "test-credentials";
pub const NAMESPACE_UID: &str = "namespace-uid";

// ---------------------------------------------------------------------------
// Builders

pub fn test_binding() -> ServiceBinding {
    let spec = ServiceBindingSpec {
        instance_ref: controller::crd::LocalObjectReference {
            name: INSTANCE_NAME.to_string(),
        },
        external_id: BINDING_EXTERNAL_ID.to_string(),
        secret_name: SECRET_NAME.to_string(),
        parameters: None,
        parameters_from: Vec::new(),
        user_info: None,
    };
    let mut binding = ServiceBinding::new(BINDING_NAME, spec);
    binding.metadata.namespace = Some(NAMESPACE.to_string());
    binding.metadata.uid = Some(BINDING_UID.to_string());
    binding.metadata.generation = Some(1);
    binding.metadata.finalizers = Some(vec![SERVICE_BINDING_FINALIZER.to_string()]);
    binding
}

pub fn deleted_binding() -> ServiceBinding {
    let mut binding = test_binding();
    binding.metadata.deletion_timestamp =
        Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(
            chrono::Utc::now(),
        ));
    binding
}

pub fn ready_instance() -> ServiceInstance {
    let spec = ServiceInstanceSpec {
        external_service_class_name: "test-class-external-name".to_string(),
        external_service_plan_name: "test-plan-external-name".to_string(),
        external_id: INSTANCE_EXTERNAL_ID.to_string(),
        cluster_service_class_ref: Some(CLASS_NAME.to_string()),
        cluster_service_plan_ref: Some(PLAN_NAME.to_string()),
    };
    let mut instance = ServiceInstance::new(INSTANCE_NAME, spec);
    instance.metadata.namespace = Some(NAMESPACE.to_string());
    instance.status = Some(ServiceInstanceStatus {
        conditions: vec![ServiceInstanceCondition {
            r#type: "Ready".to_string(),
            status: "True".to_string(),
            reason: None,
            message: None,
            last_transition_time: None,
        }],
        async_op_in_progress: false,
    });
    instance
}

pub fn test_class() -> ClusterServiceClass {
    ClusterServiceClass::new(
        CLASS_NAME,
        ClusterServiceClassSpec {
            external_id: CLASS_EXTERNAL_ID.to_string(),
            external_name: "test-class-external-name".to_string(),
            cluster_service_broker_name: BROKER_NAME.to_string(),
            bindable: true,
            description: None,
        },
    )
}

pub fn test_plan() -> ClusterServicePlan {
    ClusterServicePlan::new(
        PLAN_NAME,
        ClusterServicePlanSpec {
            external_id: PLAN_EXTERNAL_ID.to_string(),
            external_name: "test-plan-external-name".to_string(),
            cluster_service_broker_name: BROKER_NAME.to_string(),
            bindable: None,
        },
    )
}

pub fn test_broker() -> ClusterServiceBroker {
    ClusterServiceBroker::new(
        BROKER_NAME,
        ClusterServiceBrokerSpec {
            url: "https://broker.example.com".to_string(),
        },
    )
}

pub fn protocol_error(status: u16) -> BrokerError {
    BrokerError::Protocol {
        status,
        error_message: None,
        description: None,
    }
}

pub fn transport_error() -> BrokerError {
    BrokerError::Transport("connection refused".to_string())
}

// ---------------------------------------------------------------------------
// Fakes

#[derive(Default)]
pub struct FakeResolver {
    pub instance: Option<ServiceInstance>,
    pub class: Option<ClusterServiceClass>,
    pub plan: Option<ClusterServicePlan>,
    pub broker: Option<ClusterServiceBroker>,
    pub namespace_uid: Option<String>,
}

impl FakeResolver {
    /// A resolver holding the full healthy catalog chain.
    pub fn full() -> Self {
        Self {
            instance: Some(ready_instance()),
            class: Some(test_class()),
            plan: Some(test_plan()),
            broker: Some(test_broker()),
            namespace_uid: Some(NAMESPACE_UID.to_string()),
        }
    }
}

#[async_trait]
impl ReferenceResolver for FakeResolver {
    async fn service_instance(
        &self,
        _namespace: &str,
        _name: &str,
    ) -> Result<Option<ServiceInstance>, ClusterError> {
        Ok(self.instance.clone())
    }

    async fn cluster_service_class(
        &self,
        _name: &str,
    ) -> Result<Option<ClusterServiceClass>, ClusterError> {
        Ok(self.class.clone())
    }

    async fn cluster_service_plan(
        &self,
        _name: &str,
    ) -> Result<Option<ClusterServicePlan>, ClusterError> {
        Ok(self.plan.clone())
    }

    async fn cluster_service_broker(
        &self,
        _name: &str,
    ) -> Result<Option<ClusterServiceBroker>, ClusterError> {
        Ok(self.broker.clone())
    }

    async fn namespace_uid(&self, namespace: &str) -> Result<String, ClusterError> {
        self.namespace_uid
            .clone()
            .ok_or_else(|| ClusterError::Other(format!("namespace {namespace:?} lookup failed")))
    }
}

#[derive(Default)]
pub struct FakeBroker {
    pub bind_error: Mutex<Option<BrokerError>>,
    pub bind_credentials: Mutex<BTreeMap<String, serde_json::Value>>,
    pub unbind_error: Mutex<Option<BrokerError>>,
    pub bind_calls: Mutex<Vec<BindRequest>>,
    pub unbind_calls: Mutex<Vec<UnbindRequest>>,
}

impl FakeBroker {
    pub fn succeeding_with(credentials: &[(&str, serde_json::Value)]) -> Self {
        let broker = Self::default();
        *broker.bind_credentials.lock().unwrap() = credentials
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect();
        broker
    }

    pub fn failing_bind(error: BrokerError) -> Self {
        let broker = Self::default();
        *broker.bind_error.lock().unwrap() = Some(error);
        broker
    }

    pub fn failing_unbind(error: BrokerError) -> Self {
        let broker = Self::default();
        *broker.unbind_error.lock().unwrap() = Some(error);
        broker
    }

    pub fn bind_call_count(&self) -> usize {
        self.bind_calls.lock().unwrap().len()
    }

    pub fn unbind_call_count(&self) -> usize {
        self.unbind_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl BrokerClient for FakeBroker {
    async fn bind(
        &self,
        _broker: &ClusterServiceBroker,
        request: &BindRequest,
    ) -> Result<BindResponse, BrokerError> {
        self.bind_calls.lock().unwrap().push(request.clone());
        if let Some(err) = self.bind_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(BindResponse {
            credentials: self.bind_credentials.lock().unwrap().clone(),
        })
    }

    async fn unbind(
        &self,
        _broker: &ClusterServiceBroker,
        request: &UnbindRequest,
    ) -> Result<(), BrokerError> {
        self.unbind_calls.lock().unwrap().push(request.clone());
        if let Some(err) = self.unbind_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSecretStore {
    pub secrets: Mutex<BTreeMap<(String, String), Secret>>,
    pub deletes: Mutex<Vec<String>>,
    pub fail_writes: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl FakeSecretStore {
    pub fn with_secret(namespace: &str, secret: Secret) -> Self {
        let store = Self::default();
        let name = secret.metadata.name.clone().unwrap_or_default();
        store
            .secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name), secret);
        store
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, ClusterError> {
        Ok(self.secret(namespace, name))
    }

    async fn create(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ClusterError::Other("secret write refused".to_string()));
        }
        let name = secret.metadata.name.clone().unwrap_or_default();
        self.secrets
            .lock()
            .unwrap()
            .insert((namespace.to_string(), name), secret.clone());
        Ok(())
    }

    async fn update(&self, namespace: &str, secret: &Secret) -> Result<(), ClusterError> {
        self.create(namespace, secret).await
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(ClusterError::Other("secret delete refused".to_string()));
        }
        self.deletes.lock().unwrap().push(name.to_string());
        self.secrets
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStatusWriter {
    /// Every binding passed to `update_status`, in order.
    pub updates: Mutex<Vec<ServiceBinding>>,
    pub fail_next_update: AtomicBool,
    pub finalizer_removed: AtomicBool,
}

impl FakeStatusWriter {
    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn last_update(&self) -> ServiceBinding {
        self.updates
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("at least one status update expected")
    }
}

#[async_trait]
impl BindingStatusWriter for FakeStatusWriter {
    async fn update_status(
        &self,
        binding: &ServiceBinding,
    ) -> Result<ServiceBinding, ClusterError> {
        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            return Err(ClusterError::Conflict {
                kind: "ServiceBinding",
                name: binding.name_any(),
            });
        }
        self.updates.lock().unwrap().push(binding.clone());
        Ok(binding.clone())
    }

    async fn ensure_finalizer(
        &self,
        binding: &ServiceBinding,
    ) -> Result<ServiceBinding, ClusterError> {
        let mut binding = binding.clone();
        let finalizers = binding.metadata.finalizers.get_or_insert_with(Vec::new);
        if !finalizers.iter().any(|f| f == SERVICE_BINDING_FINALIZER) {
            finalizers.push(SERVICE_BINDING_FINALIZER.to_string());
        }
        Ok(binding)
    }

    async fn remove_finalizer(&self, _binding: &ServiceBinding) -> Result<(), ClusterError> {
        self.finalizer_removed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRecorder {
    pub events: Mutex<Vec<(EventKind, String, String)>>,
}

impl FakeRecorder {
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, reason, _)| reason.clone())
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(kind, _, _)| *kind == EventKind::Warning)
            .map(|(_, reason, _)| reason.clone())
            .collect()
    }
}

#[async_trait]
impl EventRecorder for FakeRecorder {
    async fn record(&self, _binding: &ServiceBinding, kind: EventKind, reason: &str, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push((kind, reason.to_string(), message.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Harness

pub struct Harness {
    pub reconciler: Reconciler,
    pub broker: Arc<FakeBroker>,
    pub secrets: Arc<FakeSecretStore>,
    pub status: Arc<FakeStatusWriter>,
    pub events: Arc<FakeRecorder>,
}

pub fn harness(resolver: FakeResolver, broker: FakeBroker) -> Harness {
    harness_with_secrets(resolver, broker, FakeSecretStore::default())
}

pub fn harness_with_secrets(
    resolver: FakeResolver,
    broker: FakeBroker,
    secrets: FakeSecretStore,
) -> Harness {
    let broker = Arc::new(broker);
    let secrets = Arc::new(secrets);
    let status = Arc::new(FakeStatusWriter::default());
    let events = Arc::new(FakeRecorder::default());
    let reconciler = Reconciler {
        config: ControllerConfig::default(),
        broker: broker.clone(),
        resolver: Arc::new(resolver),
        secrets: secrets.clone(),
        status: status.clone(),
        events: events.clone(),
    };
    Harness {
        reconciler,
        broker,
        secrets,
        status,
        events,
    }
}
