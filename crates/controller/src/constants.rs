//! # Constants
//!
//! Default values for controller configuration and the identity tokens the
//! controller stamps onto the resources it manages.

/// Finalizer placed on every ServiceBinding so that physical deletion is
/// blocked until the broker-side binding has been deleted.
pub const SERVICE_BINDING_FINALIZER: &str = "servicecatalog.octopilot.io/finalizer";

/// How long a failed bind/unbind operation is retried before it is marked
/// as terminally failed (seconds). Observed default: 7 days.
pub const DEFAULT_RECONCILIATION_RETRY_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Periodic resync interval for bindings with nothing to do (seconds).
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 5 * 60;

/// Requeue delay after a reconciliation error (seconds).
pub const DEFAULT_ERROR_REQUEUE_SECS: u64 = 60;

/// Request timeout for Open Service Broker calls (seconds).
pub const DEFAULT_BROKER_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Port the metrics/probe HTTP server listens on.
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Open Service Broker API version sent in the `X-Broker-API-Version` header.
pub const OSB_API_VERSION: &str = "2.13";

/// Header carrying the originating identity of the user that created the
/// binding, when the feature is enabled.
pub const OSB_ORIGINATING_IDENTITY_HEADER: &str = "X-Broker-API-Originating-Identity";

/// Platform value used in originating identity headers.
pub const OSB_ORIGINATING_IDENTITY_PLATFORM: &str = "kubernetes";
