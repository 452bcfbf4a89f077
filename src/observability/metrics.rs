//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `capsule_argo_addon_reconciliations_total` - Tenant reconciliations
//! - `capsule_argo_addon_reconciliation_errors_total{reason}` - Failed tenant reconciliations
//! - `capsule_argo_addon_reconciliation_duration_seconds` - Duration of tenant reconciliations
//! - `capsule_argo_addon_requeues_total{trigger}` - Requeues by trigger source
//! - `capsule_argo_addon_dependent_operations_total{kind,action}` - Writes to dependent objects
//! - `capsule_argo_addon_ownership_conflicts_total{kind}` - Dependents blocked by a foreign object
//! - `capsule_argo_addon_settings_reloads_total{result}` - Settings publications and rejections

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "capsule_argo_addon_reconciliations_total",
        "Total number of tenant reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "capsule_argo_addon_reconciliation_errors_total",
            "Total number of failed tenant reconciliations by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "capsule_argo_addon_reconciliation_duration_seconds",
            "Duration of tenant reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "capsule_argo_addon_requeues_total",
            "Total number of requeues by trigger source",
        ),
        &["trigger"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static DEPENDENT_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "capsule_argo_addon_dependent_operations_total",
            "Total number of writes to tenant dependents by kind and action",
        ),
        &["kind", "action"],
    )
    .expect("Failed to create DEPENDENT_OPERATIONS_TOTAL metric - this should never happen")
});

static OWNERSHIP_CONFLICTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "capsule_argo_addon_ownership_conflicts_total",
            "Total number of dependents blocked by an existing object not owned by the tenant",
        ),
        &["kind"],
    )
    .expect("Failed to create OWNERSHIP_CONFLICTS_TOTAL metric - this should never happen")
});

static SETTINGS_RELOADS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "capsule_argo_addon_settings_reloads_total",
            "Total number of settings reloads by result",
        ),
        &["result"],
    )
    .expect("Failed to create SETTINGS_RELOADS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Registration only fails on duplicate metric names"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEPENDENT_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OWNERSHIP_CONFLICTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SETTINGS_RELOADS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(reason: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[reason])
        .inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues_total(trigger: &str) {
    REQUEUES_TOTAL.with_label_values(&[trigger]).inc();
}

pub fn increment_dependent_operation(kind: &str, action: &str) {
    DEPENDENT_OPERATIONS_TOTAL
        .with_label_values(&[kind, action])
        .inc();
}

pub fn increment_ownership_conflicts(kind: &str) {
    OWNERSHIP_CONFLICTS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_settings_reloads(result: &str) {
    SETTINGS_RELOADS_TOTAL.with_label_values(&[result]).inc();
}

/// Current metric families encoded in the Prometheus text format
pub fn gather_text() -> Result<String> {
    use prometheus::Encoder;

    let mut buffer = Vec::new();
    prometheus::TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
