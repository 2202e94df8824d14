use axum::http::StatusCode;
use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

pub static CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "prefs_host_connections_total",
        "Client connections accepted by the host"
    )
    .expect("register connections_total")
});

pub static CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "prefs_host_connections_active",
        "Client connections currently being served"
    )
    .expect("register connections_active")
});

/// `/metrics` handler body for the admin server.
pub fn metrics_response() -> (StatusCode, String) {
    match service::observability::encode_metrics() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_metrics_show_up_in_the_shared_registry() {
        CONNECTIONS_TOTAL.inc();
        CONNECTIONS_ACTIVE.set(0);
        let (status, body) = metrics_response();
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("prefs_host_connections_total"));
    }
}
