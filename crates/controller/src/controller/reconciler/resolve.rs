//! # Reference Resolution
//!
//! Walks from a binding to the catalog objects its broker calls need: the
//! ServiceInstance in the binding's namespace and the cluster-scoped class,
//! plan, and broker hanging off it. Shared by the bind, unbind, and orphan
//! mitigation paths.

use super::conditions::{
    REASON_REFERENCED_NON_EXISTENT_BROKER, REASON_REFERENCED_NON_EXISTENT_CLASS,
    REASON_REFERENCED_NON_EXISTENT_INSTANCE, REASON_REFERENCED_NON_EXISTENT_PLAN,
};
use crate::cluster::{ClusterError, ReferenceResolver};
use crate::crd::{
    ClusterServiceBroker, ClusterServiceClass, ClusterServicePlan, ServiceBinding, ServiceInstance,
};
use kube::ResourceExt;
use thiserror::Error;

/// The full chain of catalog objects behind a binding.
#[derive(Debug, Clone)]
pub struct ResolvedReferences {
    pub instance: ServiceInstance,
    pub class: ClusterServiceClass,
    pub plan: ClusterServicePlan,
    pub broker: ClusterServiceBroker,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("ServiceBinding references a non-existent ServiceInstance {namespace}/{name}")]
    InstanceNotFound { namespace: String, name: String },
    /// The upstream resolver has not filled in the instance's class/plan refs
    /// yet. Transient; the caller retries without touching status.
    #[error("references for ServiceInstance {namespace}/{name} have not been resolved yet")]
    RefsNotResolved { namespace: String, name: String },
    #[error("references a non-existent ClusterServiceClass {name:?}")]
    ClassNotFound { name: String },
    #[error("references a non-existent ClusterServicePlan {name:?}")]
    PlanNotFound { name: String },
    #[error("references a non-existent ClusterServiceBroker {name:?}")]
    BrokerNotFound { name: String },
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl ResolveError {
    /// Condition reason for the failure, when it warrants a status write.
    /// Unresolved refs and plain API errors do not.
    #[must_use]
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::InstanceNotFound { .. } => Some(REASON_REFERENCED_NON_EXISTENT_INSTANCE),
            Self::ClassNotFound { .. } => Some(REASON_REFERENCED_NON_EXISTENT_CLASS),
            Self::PlanNotFound { .. } => Some(REASON_REFERENCED_NON_EXISTENT_PLAN),
            Self::BrokerNotFound { .. } => Some(REASON_REFERENCED_NON_EXISTENT_BROKER),
            Self::RefsNotResolved { .. } | Self::Cluster(_) => None,
        }
    }
}

pub async fn resolve_references(
    resolver: &dyn ReferenceResolver,
    binding: &ServiceBinding,
) -> Result<ResolvedReferences, ResolveError> {
    let namespace = binding.namespace().unwrap_or_default();
    let instance_name = binding.spec.instance_ref.name.clone();

    let instance = resolver
        .service_instance(&namespace, &instance_name)
        .await?
        .ok_or_else(|| ResolveError::InstanceNotFound {
            namespace: namespace.clone(),
            name: instance_name.clone(),
        })?;

    let (Some(class_name), Some(plan_name)) = (
        instance.spec.cluster_service_class_ref.clone(),
        instance.spec.cluster_service_plan_ref.clone(),
    ) else {
        return Err(ResolveError::RefsNotResolved {
            namespace,
            name: instance_name,
        });
    };

    let class = resolver
        .cluster_service_class(&class_name)
        .await?
        .ok_or_else(|| ResolveError::ClassNotFound {
            name: class_name.clone(),
        })?;

    let plan = resolver
        .cluster_service_plan(&plan_name)
        .await?
        .ok_or_else(|| ResolveError::PlanNotFound {
            name: plan_name.clone(),
        })?;

    let broker_name = class.spec.cluster_service_broker_name.clone();
    let broker = resolver
        .cluster_service_broker(&broker_name)
        .await?
        .ok_or(ResolveError::BrokerNotFound { name: broker_name })?;

    Ok(ResolvedReferences {
        instance,
        class,
        plan,
        broker,
    })
}
