//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `service_binding_reconciliations_total` - Total number of reconciliation passes
//! - `service_binding_reconciliation_errors_total` - Total number of failed passes
//! - `service_binding_broker_requests_total` - Broker calls by operation and outcome
//! - `service_binding_orphan_mitigations_total` - Orphan mitigation attempts
//! - `service_binding_orphan_mitigation_successes_total` - Orphan mitigations completed

use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "service_binding_reconciliations_total",
        "Total number of reconciliation passes",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "service_binding_reconciliation_errors_total",
        "Total number of reconciliation passes that ended in an error",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static BROKER_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "service_binding_broker_requests_total",
            "Total number of broker calls by operation and outcome",
        ),
        &["operation", "outcome"],
    )
    .expect("Failed to create BROKER_REQUESTS_TOTAL metric - this should never happen")
});

static ORPHAN_MITIGATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "service_binding_orphan_mitigations_total",
        "Total number of orphan mitigation attempts",
    )
    .expect("Failed to create ORPHAN_MITIGATIONS_TOTAL metric - this should never happen")
});

static ORPHAN_MITIGATION_SUCCESSES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "service_binding_orphan_mitigation_successes_total",
        "Total number of orphan mitigations that completed",
    )
    .expect("Failed to create ORPHAN_MITIGATION_SUCCESSES_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BROKER_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ORPHAN_MITIGATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ORPHAN_MITIGATION_SUCCESSES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn record_broker_request(operation: &str, outcome: &str) {
    BROKER_REQUESTS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn increment_orphan_mitigations() {
    ORPHAN_MITIGATIONS_TOTAL.inc();
}

pub fn increment_orphan_mitigation_successes() {
    ORPHAN_MITIGATION_SUCCESSES_TOTAL.inc();
}
