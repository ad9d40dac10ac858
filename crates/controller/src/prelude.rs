//! # Prelude
//!
//! Convenient re-exports of the types most callers need.

pub use crate::broker::{
    BindRequest, BindResponse, BrokerClient, BrokerError, Outcome, UnbindRequest,
};
pub use crate::cluster::{
    BindingStatusWriter, ClusterError, EventKind, EventRecorder, ReferenceResolver, SecretStore,
};
pub use crate::config::ControllerConfig;
pub use crate::controller::reconciler::{Reconciler, ReconcilerError};
pub use crate::crd::{
    ClusterServiceBroker, ClusterServiceClass, ClusterServicePlan, ConditionStatus, ServiceBinding,
    ServiceBindingCondition, ServiceBindingConditionType, ServiceBindingOperation,
    ServiceBindingSpec, ServiceBindingStatus, ServiceInstance,
};
