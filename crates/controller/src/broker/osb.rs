//! # HTTP Broker Client
//!
//! `reqwest`-backed implementation of [`BrokerClient`] speaking the Open
//! Service Broker binding API.

use super::{BindRequest, BindResponse, BrokerClient, BrokerError, UnbindRequest};
use crate::constants::{OSB_API_VERSION, OSB_ORIGINATING_IDENTITY_HEADER};
use crate::crd::ClusterServiceBroker;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Open Service Broker HTTP client.
///
/// One instance is shared across all reconciliations; `reqwest::Client`
/// holds the connection pool internally.
#[derive(Debug, Clone)]
pub struct OsbHttpClient {
    http: reqwest::Client,
}

/// Wire body of a bind request.
#[derive(Serialize)]
struct BindRequestBody<'a> {
    service_id: &'a str,
    plan_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_guid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bind_resource: Option<BindResource<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a BTreeMap<String, serde_json::Value>>,
}

#[derive(Serialize)]
struct BindResource<'a> {
    app_guid: &'a str,
}

/// Error body brokers return alongside non-success statuses.
#[derive(Deserialize, Default)]
struct BrokerErrorBody {
    #[serde(default, rename = "error")]
    error_message: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl OsbHttpClient {
    /// Build a client with the given per-request timeout.
    pub fn new(request_timeout: Duration) -> Result<Self, anyhow::Error> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { http })
    }

    fn binding_url(broker: &ClusterServiceBroker, instance_id: &str, binding_id: &str) -> String {
        format!(
            "{}/v2/service_instances/{instance_id}/service_bindings/{binding_id}",
            broker.spec.url.trim_end_matches('/')
        )
    }

    fn apply_headers(
        builder: reqwest::RequestBuilder,
        originating_identity: Option<&super::OriginatingIdentity>,
    ) -> reqwest::RequestBuilder {
        let builder = builder.header("X-Broker-API-Version", OSB_API_VERSION);
        match originating_identity {
            Some(identity) => {
                let value = base64::engine::general_purpose::STANDARD
                    .encode(identity.value.to_string());
                builder.header(
                    OSB_ORIGINATING_IDENTITY_HEADER,
                    format!("{} {value}", identity.platform),
                )
            }
            None => builder,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BrokerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: BrokerErrorBody = response.json().await.unwrap_or_default();
        Err(BrokerError::Protocol {
            status: status.as_u16(),
            error_message: body.error_message,
            description: body.description,
        })
    }
}

#[async_trait]
impl BrokerClient for OsbHttpClient {
    async fn bind(
        &self,
        broker: &ClusterServiceBroker,
        request: &BindRequest,
    ) -> Result<BindResponse, BrokerError> {
        let url = Self::binding_url(broker, &request.instance_id, &request.binding_id);
        debug!(url = %url, binding_id = %request.binding_id, "issuing bind request");

        let body = BindRequestBody {
            service_id: &request.service_id,
            plan_id: &request.plan_id,
            app_guid: request.app_guid.as_deref(),
            bind_resource: request
                .app_guid
                .as_deref()
                .map(|app_guid| BindResource { app_guid }),
            parameters: request.parameters.as_ref(),
        };

        let builder = self
            .http
            .put(&url)
            .query(&[("accepts_incomplete", "false")])
            .json(&body);
        let response = Self::apply_headers(builder, request.originating_identity.as_ref())
            .send()
            .await
            .map_err(transport)?;
        let response = Self::check_status(response).await?;

        response
            .json::<BindResponse>()
            .await
            .map_err(|err| BrokerError::Transport(format!("reading bind response: {err}")))
    }

    async fn unbind(
        &self,
        broker: &ClusterServiceBroker,
        request: &UnbindRequest,
    ) -> Result<(), BrokerError> {
        let url = Self::binding_url(broker, &request.instance_id, &request.binding_id);
        debug!(url = %url, binding_id = %request.binding_id, "issuing unbind request");

        let builder = self.http.delete(&url).query(&[
            ("service_id", request.service_id.as_str()),
            ("plan_id", request.plan_id.as_str()),
            ("accepts_incomplete", "false"),
        ]);
        let response = Self::apply_headers(builder, request.originating_identity.as_ref())
            .send()
            .await
            .map_err(transport)?;
        Self::check_status(response).await?;
        Ok(())
    }
}

fn transport(err: reqwest::Error) -> BrokerError {
    BrokerError::Transport(err.to_string())
}
