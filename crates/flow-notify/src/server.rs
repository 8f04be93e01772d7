//! SSE HTTP surface.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures_util::stream::Stream;
use futures_util::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::CorsLayer;
use tracing::debug;

use crate::sse::SseBroadcaster;
use flow_telemetry::Metrics;

/// Shared state for the SSE handlers.
#[derive(Clone)]
pub struct NotifyState {
    broadcaster: SseBroadcaster,
}

impl NotifyState {
    #[must_use]
    pub fn new(broadcaster: SseBroadcaster) -> Self {
        Self { broadcaster }
    }
}

/// Build the notification router. Ops routes are merged in by the node.
pub fn notify_router(state: NotifyState) -> Router {
    Router::new()
        .route("/api/notifications/sse", get(sse_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Tracks a connected client for the gauge; decremented on drop so
/// disconnects are counted however the stream ends.
struct ClientGuard;

impl ClientGuard {
    fn connect() -> Self {
        Metrics::sse_client_connected();
        Self
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        Metrics::sse_client_disconnected();
    }
}

/// Event type on every frame, so clients can register a listener by
/// name instead of parsing bare `message` events.
const SSE_EVENT_TYPE: &str = "order.executed";

/// GET /api/notifications/sse
///
/// Streams every notification frame from connection time on. A client
/// that lags past the broadcast buffer silently skips the missed
/// frames.
async fn sse_handler(
    State(state): State<NotifyState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("SSE client connected");
    let guard = ClientGuard::connect();
    let stream = BroadcastStream::new(state.broadcaster.subscribe()).filter_map(move |msg| {
        let _held = &guard;
        futures_util::future::ready(match msg {
            Ok(json) => Some(Ok(Event::default().event(SSE_EVENT_TYPE).data(json))),
            // Lagged receiver: skip what was missed, keep streaming.
            Err(_) => None,
        })
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::NotificationFrame;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn frame() -> NotificationFrame {
        NotificationFrame {
            order_id: "o-1".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: "buy".to_string(),
            status: "success".to_string(),
            profit_loss: "12.5".to_string(),
            executed_at: "2026-01-15T10:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sse_endpoint_streams_frames() {
        let hub = SseBroadcaster::new(16);
        let router = notify_router(NotifyState::new(hub.clone()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client
            .write_all(
                b"GET /api/notifications/sse HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n",
            )
            .await
            .unwrap();

        // Wait for the subscription to land before publishing.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while hub.receiver_count() == 0 {
            assert!(tokio::time::Instant::now() < deadline, "client never subscribed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        hub.publish(&frame());

        let mut collected = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = tokio::time::timeout(Duration::from_secs(5), client.read(&mut buf))
                .await
                .expect("read timed out")
                .unwrap();
            assert!(n > 0, "server closed the stream");
            collected.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&collected);
            if text.contains("BTCUSDT") {
                assert!(text.contains("text/event-stream"));
                assert!(text.contains("event: order.executed"));
                assert!(text.contains("data:"));
                break;
            }
        }
    }
}
