//! Ops HTTP endpoints shared by every stage.
//!
//! Each stage process serves `GET /health` and `GET /metrics` as side
//! channels next to its own routes.

use std::net::SocketAddr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{Encoder, TextEncoder};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::TelemetryResult;

/// Router with the `/health` and `/metrics` routes.
///
/// Stages merge this into their own routers so a single port serves
/// both the stage surface and the ops surface.
pub fn ops_router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buf) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encoding failed: {e}"),
        )
            .into_response();
    }
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, encoder.format_type().to_string())],
        buf,
    )
        .into_response()
}

/// Bind and serve a stage router until cancelled.
///
/// Returns the bound address once listening (port 0 picks a free port).
pub async fn serve_ops(
    router: Router,
    port: u16,
    shutdown: CancellationToken,
) -> TelemetryResult<SocketAddr> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;
    info!(addr = %local, "Ops server listening");

    tokio::spawn(async move {
        let _ = axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
    });

    Ok(local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let shutdown = CancellationToken::new();
        let addr = serve_ops(ops_router(), 0, shutdown.clone()).await.unwrap();

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut stream = stream;
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut buf = String::new();
        stream.read_to_string(&mut buf).await.unwrap();
        assert!(buf.contains("200"));
        assert!(buf.contains("\"status\":\"ok\""));

        shutdown.cancel();
    }
}
