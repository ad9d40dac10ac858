//! # ServiceBinding Controller Binary
//!
//! Bootstraps logging, metrics, the probe HTTP server, and the watch loop.

use anyhow::Result;
use controller::config::ControllerConfig;
use controller::observability::metrics;
use controller::observability::server::{start_server, ServerState};
use controller::runtime;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // rustls needs a process-wide crypto provider before any TLS client is
    // built; an Err here just means one is already installed.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = ControllerConfig::from_env();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "controller={}",
            config.log_level.to_lowercase()
        ))
    });
    if config.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting ServiceBinding Controller");

    metrics::register_metrics()?;

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
    });

    let server_port = config.metrics_port;
    let probe_state = server_state.clone();
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, probe_state).await {
            error!("HTTP server error: {}", e);
        }
    });

    server_state.is_ready.store(true, Ordering::Relaxed);

    runtime::run(config).await
}
