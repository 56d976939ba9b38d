//! Prometheus metrics for smm-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Counter for provider API calls by action and outcome.
pub static PROVIDER_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "smm_provider_requests_total",
        "Total number of provider API requests",
        &["action", "outcome"]
    )
    .expect("Failed to register PROVIDER_REQUESTS")
});

/// Histogram for provider API latency by action.
pub static PROVIDER_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "smm_provider_request_duration_seconds",
        "Provider API request duration in seconds",
        &["action"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    )
    .expect("Failed to register PROVIDER_REQUEST_DURATION")
});

/// Histogram for database query duration.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "smm_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for order forwarding attempts.
pub static ORDER_FORWARDS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "smm_order_forwards_total",
        "Total number of order forwarding attempts",
        &["outcome"]
    )
    .expect("Failed to register ORDER_FORWARDS")
});

/// Counter for orders visited by the status reconciler.
pub static RECONCILED_ORDERS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "smm_reconciled_orders_total",
        "Total number of orders polled by the status reconciler",
        &["outcome"]
    )
    .expect("Failed to register RECONCILED_ORDERS")
});

/// Counter for services visited by the rate synchronizer.
pub static RATE_SYNC_SERVICES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "smm_rate_sync_services_total",
        "Total number of services checked by the rate synchronizer",
        &["outcome"]
    )
    .expect("Failed to register RATE_SYNC_SERVICES")
});

/// Counter for catalog imports.
pub static SERVICE_IMPORTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "smm_service_imports_total",
        "Total number of catalog import batches",
        &["status"]
    )
    .expect("Failed to register SERVICE_IMPORTS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&PROVIDER_REQUESTS);
    Lazy::force(&PROVIDER_REQUEST_DURATION);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&ORDER_FORWARDS);
    Lazy::force(&RECONCILED_ORDERS);
    Lazy::force(&RATE_SYNC_SERVICES);
    Lazy::force(&SERVICE_IMPORTS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_provider_request(action: &str, outcome: &str, duration_secs: f64) {
    PROVIDER_REQUESTS.with_label_values(&[action, outcome]).inc();
    PROVIDER_REQUEST_DURATION
        .with_label_values(&[action])
        .observe(duration_secs);
}

pub fn record_forward(outcome: &str) {
    ORDER_FORWARDS.with_label_values(&[outcome]).inc();
}

pub fn record_reconciled_order(outcome: &str) {
    RECONCILED_ORDERS.with_label_values(&[outcome]).inc();
}

pub fn record_rate_sync(outcome: &str) {
    RATE_SYNC_SERVICES.with_label_values(&[outcome]).inc();
}

pub fn record_import(status: &str) {
    SERVICE_IMPORTS.with_label_values(&[status]).inc();
}
