//! # Open Service Broker Protocol
//!
//! Request/response types for the bind and unbind calls, the error taxonomy
//! the reconciler classifies on, and the `BrokerClient` trait with its
//! HTTP implementation.

mod osb;
mod outcome;

pub use osb::OsbHttpClient;
pub use outcome::{classify_broker_error, retry_window_expired, Outcome};

use crate::crd::ClusterServiceBroker;
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

/// Request to create a binding at the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct BindRequest {
    /// Identity of the binding, from the ServiceBinding's `externalID`.
    pub binding_id: String,
    /// Identity of the instance being bound to.
    pub instance_id: String,
    /// Identity of the class the instance belongs to.
    pub service_id: String,
    /// Identity of the plan the instance was provisioned with.
    pub plan_id: String,
    /// GUID of the application the credentials are for; the UID of the
    /// binding's namespace.
    pub app_guid: Option<String>,
    /// Merged bind parameters, if any.
    pub parameters: Option<BTreeMap<String, serde_json::Value>>,
    /// Identity of the user that requested the binding, when the
    /// originating identity feature is enabled.
    pub originating_identity: Option<OriginatingIdentity>,
}

/// Request to delete a binding at the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct UnbindRequest {
    pub binding_id: String,
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    pub originating_identity: Option<OriginatingIdentity>,
}

/// Credentials returned by a successful bind.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct BindResponse {
    #[serde(default)]
    pub credentials: BTreeMap<String, serde_json::Value>,
}

/// Identity of the platform user on whose behalf a call is made.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OriginatingIdentity {
    pub platform: String,
    pub value: serde_json::Value,
}

/// Failure modes of a broker call.
///
/// A protocol error means the broker answered with a non-success status and
/// carries that status for classification; a transport error means the
/// response never arrived (or was unreadable) and it is unknown whether the
/// broker acted.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    #[error("Status: {status}; ErrorMessage: {}; Description: {}",
        .error_message.as_deref().unwrap_or("<nil>"),
        .description.as_deref().unwrap_or("<nil>"))]
    Protocol {
        status: u16,
        error_message: Option<String>,
        description: Option<String>,
    },
    #[error("{0}")]
    Transport(String),
}

/// Client for the Open Service Broker bind/unbind calls.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn bind(
        &self,
        broker: &ClusterServiceBroker,
        request: &BindRequest,
    ) -> Result<BindResponse, BrokerError>;

    async fn unbind(
        &self,
        broker: &ClusterServiceBroker,
        request: &UnbindRequest,
    ) -> Result<(), BrokerError>;
}
