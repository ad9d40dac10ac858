//! # Custom Resource Definitions
//!
//! The ServiceBinding CRD owned by this controller plus the read-only catalog
//! resources it references during reconciliation.

mod binding;
mod references;
mod status;

pub use binding::{
    LocalObjectReference, ParametersFromSource, SecretKeyReference, ServiceBinding,
    ServiceBindingSpec, UserInfo,
};
pub use references::{
    ClusterServiceBroker, ClusterServiceBrokerSpec, ClusterServiceClass, ClusterServiceClassSpec,
    ClusterServicePlan, ClusterServicePlanSpec, ServiceInstance, ServiceInstanceCondition,
    ServiceInstanceSpec, ServiceInstanceStatus,
};
pub use status::{
    ConditionStatus, ServiceBindingCondition, ServiceBindingConditionType, ServiceBindingOperation,
    ServiceBindingPropertiesState, ServiceBindingStatus,
};
