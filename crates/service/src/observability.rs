use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

// Prometheus metrics (default registry)
pub static DISPATCHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "prefs_dispatched_requests_total",
        "Requests handled by the host dispatcher, by operation tag",
        &["operation"]
    )
    .expect("register dispatched_requests_total")
});

pub static DISPATCH_ERRORS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "prefs_dispatch_errors_total",
        "Requests answered with an error reply"
    )
    .expect("register dispatch_errors_total")
});

pub static PROXIED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "prefs_proxied_requests_total",
        "Requests sent by proxy backends"
    )
    .expect("register proxied_requests_total")
});

pub static DROPPED_RESPONSES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "prefs_dropped_responses_total",
        "Replies whose correlation id had no pending request"
    )
    .expect("register dropped_responses_total")
});

pub static PENDING_REQUESTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "prefs_pending_requests",
        "Proxied requests waiting for a reply"
    )
    .expect("register pending_requests")
});

pub static QUEUE_TASK_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "prefs_queue_task_failures_total",
        "Serialized work queue tasks that failed or panicked"
    )
    .expect("register queue_task_failures_total")
});

/// Encode the default registry in the text exposition format.
pub fn encode_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("metrics encode error: {e}"))?;
    String::from_utf8(buffer).map_err(|e| format!("metrics encode error: {e}"))
}
