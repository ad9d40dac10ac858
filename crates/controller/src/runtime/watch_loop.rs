//! # Watch Loop
//!
//! Wires the reconciler to a `kube-runtime` `Controller` watching all
//! ServiceBinding resources, with graceful shutdown on SIGTERM/SIGINT.

use super::error_policy::error_policy;
use crate::broker::OsbHttpClient;
use crate::cluster::kube::{
    KubeBindingStatusWriter, KubeEventRecorder, KubeReferenceResolver, KubeSecretStore,
};
use crate::config::ControllerConfig;
use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::ServiceBinding;
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;
use kube::Client;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Build the shared reconciler context from a client and configuration.
pub fn build_reconciler(client: Client, config: ControllerConfig) -> anyhow::Result<Reconciler> {
    let broker = OsbHttpClient::new(config.broker_request_timeout)?;
    Ok(Reconciler {
        config,
        broker: Arc::new(broker),
        resolver: Arc::new(KubeReferenceResolver::new(client.clone())),
        secrets: Arc::new(KubeSecretStore::new(client.clone())),
        status: Arc::new(KubeBindingStatusWriter::new(client.clone())),
        events: Arc::new(KubeEventRecorder::new(client)),
    })
}

/// Run the controller until shutdown.
pub async fn run(config: ControllerConfig) -> anyhow::Result<()> {
    let client = Client::try_default().await?;
    let reconciler = Arc::new(build_reconciler(client.clone(), config)?);
    let bindings: Api<ServiceBinding> = Api::all(client);

    info!("starting ServiceBinding watch loop");
    Controller::new(bindings, watcher::Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, error_policy, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((binding, _)) => debug!(binding = %binding.name, "reconciled"),
                Err(err) => warn!(error = %err, "reconciliation failed"),
            }
        })
        .await;

    info!("Controller stopped");
    Ok(())
}

async fn reconcile(
    binding: Arc<ServiceBinding>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    ctx.reconcile(&binding).await?;
    Ok(Action::requeue(ctx.config.resync_interval))
}
