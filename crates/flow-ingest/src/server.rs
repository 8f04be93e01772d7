//! Webhook HTTP surface.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use flow_core::envelope::kind;
use flow_core::{queues, Envelope, Side, Signal};
use flow_telemetry::Metrics;
use flow_transport::QueueTransport;

/// Shared state for webhook handlers.
#[derive(Clone)]
pub struct IngestState {
    transport: QueueTransport,
}

impl IngestState {
    #[must_use]
    pub fn new(transport: QueueTransport) -> Self {
        Self { transport }
    }
}

/// Build the webhook router. Ops routes (health, metrics) are merged in
/// by the node.
pub fn ingest_router(state: IngestState) -> Router {
    Router::new()
        .route("/webhook", post(receive_webhook))
        .with_state(state)
}

/// The fields a webhook must carry. Everything else in the body is
/// preserved verbatim in `raw_payload`.
#[derive(Debug, Deserialize)]
struct WebhookFields {
    source: String,
    symbol: String,
    side: Side,
    confidence: Decimal,
}

/// POST /webhook
///
/// 202 with the assigned signal id on success, 400 on shape or range
/// violations, 502 when the broker hand-off fails. Providers are
/// expected to retry 5xx; the duplicate that produces is absorbed by
/// processor-side dedup.
async fn receive_webhook(
    State(state): State<IngestState>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    let signal = match parse_signal(&body) {
        Ok(signal) => signal,
        Err(reason) => {
            warn!(reason = %reason, "Webhook rejected");
            Metrics::signal("rejected");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": reason })),
            )
                .into_response();
        }
    };

    let envelope = match Envelope::wrap(kind::SIGNAL, &signal) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Signal serialization failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if let Err(e) = state.transport.publish(queues::SIGNAL_RECEIVED, &envelope) {
        warn!(error = %e, "Signal publish failed");
        Metrics::signal("publish_failed");
        return (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({ "error": "queue unavailable" })),
        )
            .into_response();
    }

    info!(
        signal_id = %signal.id,
        source = %signal.source,
        symbol = %signal.symbol,
        side = %signal.side,
        "Signal accepted"
    );
    Metrics::signal("accepted");
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "id": signal.id })),
    )
        .into_response()
}

/// Validate the raw body and stamp identity fields.
fn parse_signal(body: &serde_json::Value) -> Result<Signal, String> {
    let fields: WebhookFields =
        serde_json::from_value(body.clone()).map_err(|e| e.to_string())?;
    if fields.source.trim().is_empty() {
        return Err("source must not be empty".to_string());
    }
    if fields.symbol.trim().is_empty() {
        return Err("symbol must not be empty".to_string());
    }
    if fields.confidence < Decimal::ZERO || fields.confidence > Decimal::ONE {
        return Err(format!(
            "confidence {} outside [0, 1]",
            fields.confidence
        ));
    }
    Ok(Signal {
        id: Uuid::new_v4(),
        source: fields.source,
        symbol: fields.symbol,
        side: fields.side,
        confidence: fields.confidence,
        raw_payload: body.clone(),
        received_at: Utc::now(),
    })
}
