//! Lightweight admin HTTP server spawner
//!
//! Exposes `/healthz` and `/metrics` endpoints, with metrics provided by caller.

use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::types::Health;

async fn healthz() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn metrics_handler(f: fn() -> (StatusCode, String)) -> (StatusCode, String) {
    f()
}

fn router(metrics_fn: fn() -> (StatusCode, String)) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(move || metrics_handler(metrics_fn)))
}

/// Bind the admin server and serve it on the current runtime.
/// The metrics are provided by the caller via a function.
pub async fn spawn_admin_server(
    addr: &str,
    metrics_fn: fn() -> (StatusCode, String),
) -> anyhow::Result<JoinHandle<()>> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("cannot bind admin server on {addr}: {e}"))?;
    let local = listener.local_addr()?;
    info!(addr = %local, "admin server listening");
    let app = router(metrics_fn);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "admin server stopped");
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_metrics() -> (StatusCode, String) {
        (StatusCode::OK, "fake_total 1\n".to_string())
    }

    #[tokio::test]
    async fn admin_server_binds_ephemeral_port() -> anyhow::Result<()> {
        let handle = spawn_admin_server("127.0.0.1:0", fake_metrics).await?;
        assert!(!handle.is_finished());
        handle.abort();
        Ok(())
    }

    #[tokio::test]
    async fn admin_server_rejects_bad_addr() {
        let res = spawn_admin_server("not-an-addr", fake_metrics).await;
        assert!(res.is_err());
    }
}
