//! Prometheus metrics for order-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

static HTTP_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Engine/ledger operations by name and outcome (`ok` or the error kind).
pub static OPERATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_operations_total",
        "Total number of lifecycle operations by outcome",
        &["operation", "outcome"]
    )
    .expect("Failed to register order_operations_total")
});

/// Stage changes by target stage slug and trigger (auto, manual, assignment, creation).
pub static STAGE_TRANSITIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_stage_transitions_total",
        "Total number of order stage transitions",
        &["stage", "trigger"]
    )
    .expect("Failed to register order_stage_transitions_total")
});

pub static PAYMENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_payments_total",
        "Payment events by action",
        &["action"] // recorded, deleted, compensated
    )
    .expect("Failed to register order_payments_total")
});

pub static CONFLICT_RETRIES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_conflict_retries_total",
        "Optimistic write retries by operation",
        &["operation"]
    )
    .expect("Failed to register order_conflict_retries_total")
});

pub static ACTIVITY_EVENTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "order_activity_events_total",
        "Activity log events by outcome",
        &["outcome"] // written, dropped_full, dropped_closed, failed
    )
    .expect("Failed to register order_activity_events_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "order_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization) and install the recorder behind
/// the HTTP middleware counters. Safe to call more than once.
pub fn init_metrics() {
    if HTTP_METRICS_HANDLE.get().is_none() {
        match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                let _ = HTTP_METRICS_HANDLE.set(handle);
            }
            Err(e) => tracing::warn!(error = %e, "Prometheus recorder already installed"),
        }
    }

    Lazy::force(&OPERATIONS_TOTAL);
    Lazy::force(&STAGE_TRANSITIONS_TOTAL);
    Lazy::force(&PAYMENTS_TOTAL);
    Lazy::force(&CONFLICT_RETRIES_TOTAL);
    Lazy::force(&ACTIVITY_EVENTS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let mut output = HTTP_METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    output.push_str(
        &encoder
            .encode_to_string(&prometheus::gather())
            .unwrap_or_default(),
    );
    output
}

pub fn record_operation<T>(operation: &str, result: &Result<T, service_core::error::AppError>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn record_stage_transition(stage_slug: &str, trigger: &str) {
    STAGE_TRANSITIONS_TOTAL
        .with_label_values(&[stage_slug, trigger])
        .inc();
}

pub fn record_payment(action: &str) {
    PAYMENTS_TOTAL.with_label_values(&[action]).inc();
}

pub fn record_conflict_retry(operation: &str) {
    CONFLICT_RETRIES_TOTAL.with_label_values(&[operation]).inc();
}

pub fn record_activity(outcome: &str) {
    ACTIVITY_EVENTS_TOTAL.with_label_values(&[outcome]).inc();
}
