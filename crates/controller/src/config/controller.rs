//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_BROKER_REQUEST_TIMEOUT_SECS, DEFAULT_ERROR_REQUEUE_SECS, DEFAULT_METRICS_PORT,
    DEFAULT_RECONCILIATION_RETRY_DURATION_SECS, DEFAULT_RESYNC_INTERVAL_SECS,
};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment
/// variables. Environment variables are populated from a ConfigMap using
/// `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Maximum window during which a failed bind/unbind operation keeps being
    /// retried before the binding is marked terminally failed.
    /// Orphan mitigation ignores this window.
    pub reconciliation_retry_duration: Duration,
    /// Periodic requeue interval for bindings that reconcile successfully.
    pub resync_interval: Duration,
    /// Requeue delay applied by the error policy after a failed pass.
    pub error_requeue: Duration,
    /// Whether the originating identity of the user that created the binding
    /// is propagated to the broker on bind/unbind calls.
    pub originating_identity_enabled: bool,
    /// Request timeout for broker HTTP calls.
    pub broker_request_timeout: Duration,
    /// Port the metrics/probe HTTP server listens on.
    pub metrics_port: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE).
    pub log_level: String,
    /// Log format (json, text).
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            reconciliation_retry_duration: Duration::from_secs(
                DEFAULT_RECONCILIATION_RETRY_DURATION_SECS,
            ),
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS),
            error_requeue: Duration::from_secs(DEFAULT_ERROR_REQUEUE_SECS),
            originating_identity_enabled: false,
            broker_request_timeout: Duration::from_secs(DEFAULT_BROKER_REQUEST_TIMEOUT_SECS),
            metrics_port: DEFAULT_METRICS_PORT,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            reconciliation_retry_duration: env_duration_secs(
                "RECONCILIATION_RETRY_DURATION_SECS",
                defaults.reconciliation_retry_duration,
            ),
            resync_interval: env_duration_secs("RESYNC_INTERVAL_SECS", defaults.resync_interval),
            error_requeue: env_duration_secs("ERROR_REQUEUE_SECS", defaults.error_requeue),
            originating_identity_enabled: env_bool(
                "ENABLE_ORIGINATING_IDENTITY",
                defaults.originating_identity_enabled,
            ),
            broker_request_timeout: env_duration_secs(
                "BROKER_REQUEST_TIMEOUT_SECS",
                defaults.broker_request_timeout,
            ),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(defaults.metrics_port),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: std::env::var("LOG_FORMAT").unwrap_or(defaults.log_format),
        }
    }
}

fn env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(default)
}
