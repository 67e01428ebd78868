//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `github_sync_reconciliations_total` - Reconciliations by resource kind
//! - `github_sync_reconciliation_errors_total` - Run-level reconciliation errors by resource kind
//! - `github_sync_reconciliation_duration_seconds` - Duration of reconciliations by resource kind
//! - `github_sync_requeues_total` - Requeues by reason
//! - `github_sync_lock_busy_total` - Passes skipped because another pass held the sync lock
//! - `github_sync_properties_total` - Property outcomes by kind and result
//! - `github_sync_github_requests_total` - GitHub API requests by method and status
//! - `github_sync_github_request_duration_seconds` - GitHub API request latency by method
//! - `github_sync_github_retries_total` - GitHub operation retries by operation and reason

use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "github_sync_reconciliations_total",
            "Total number of reconciliations by resource kind",
        ),
        &["resource"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "github_sync_reconciliation_errors_total",
            "Total number of reconciliation errors by resource kind",
        ),
        &["resource"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "github_sync_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["resource"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("github_sync_requeues_total", "Total number of requeues by reason"),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static SYNC_LOCK_BUSY_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "github_sync_lock_busy_total",
        "Total number of passes deferred because the sync lock was held",
    )
    .expect("Failed to create SYNC_LOCK_BUSY_TOTAL metric - this should never happen")
});

static PROPERTIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "github_sync_properties_total",
            "Total number of property sync outcomes by kind and result",
        ),
        &["kind", "result"],
    )
    .expect("Failed to create PROPERTIES_TOTAL metric - this should never happen")
});

static GITHUB_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "github_sync_github_requests_total",
            "Total number of GitHub API requests by method and status",
        ),
        &["method", "status"],
    )
    .expect("Failed to create GITHUB_REQUESTS_TOTAL metric - this should never happen")
});

static GITHUB_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "github_sync_github_request_duration_seconds",
            "Duration of GitHub API requests in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        &["method"],
    )
    .expect("Failed to create GITHUB_REQUEST_DURATION metric - this should never happen")
});

static GITHUB_RETRIES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "github_sync_github_retries_total",
            "Total number of GitHub operation retries by operation and reason",
        ),
        &["operation", "reason"],
    )
    .expect("Failed to create GITHUB_RETRIES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
/// Register every metric with [`REGISTRY`]. Fails when called twice.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SYNC_LOCK_BUSY_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROPERTIES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GITHUB_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(GITHUB_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(GITHUB_RETRIES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations(resource: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[resource]).inc();
}

pub fn increment_reconciliation_errors(resource: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[resource])
        .inc();
}

pub fn observe_reconciliation_duration(resource: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[resource])
        .observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_sync_lock_busy() {
    SYNC_LOCK_BUSY_TOTAL.inc();
}

/// `result` is one of `synced`, `skipped` or `failed`
pub fn record_property_sync(kind: &str, result: &str) {
    PROPERTIES_TOTAL.with_label_values(&[kind, result]).inc();
}

pub fn record_github_request(method: &str, status: &str, duration: f64) {
    GITHUB_REQUESTS_TOTAL
        .with_label_values(&[method, status])
        .inc();
    GITHUB_REQUEST_DURATION
        .with_label_values(&[method])
        .observe(duration);
}

pub fn increment_github_retries(operation: &str, reason: &str) {
    GITHUB_RETRIES_TOTAL
        .with_label_values(&[operation, reason])
        .inc();
}
