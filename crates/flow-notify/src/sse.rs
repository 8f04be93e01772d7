//! Fan-out of notification frames to connected SSE clients.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// One frame pushed to every connected browser.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationFrame {
    pub order_id: String,
    pub symbol: String,
    pub side: String,
    pub status: String,
    pub profit_loss: String,
    pub executed_at: String,
}

/// Broadcast hub between the queue consumer and SSE connections.
///
/// Slow clients that fall behind the channel buffer miss frames; this
/// surface is a live feed, not a log.
#[derive(Clone)]
pub struct SseBroadcaster {
    tx: broadcast::Sender<String>,
}

impl SseBroadcaster {
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        let (tx, _rx) = broadcast::channel(buffer);
        Self { tx }
    }

    /// Push a frame to all connected clients. No receivers is normal.
    pub fn publish(&self, frame: &NotificationFrame) {
        match serde_json::to_string(frame) {
            Ok(json) => match self.tx.send(json) {
                Ok(n) => trace!(receivers = n, "SSE frame sent"),
                Err(_) => trace!("No SSE receivers connected"),
            },
            Err(e) => trace!(error = %e, "Failed to serialize SSE frame"),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Number of currently connected receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    async fn test_subscribers_receive_frames() {
        let hub = SseBroadcaster::new(16);
        let mut rx = hub.subscribe();

        hub.publish(&frame());

        let json = rx.recv().await.unwrap();
        assert!(json.contains("BTCUSDT"));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let hub = SseBroadcaster::new(16);
        hub.publish(&frame());
        assert_eq!(hub.receiver_count(), 0);
    }
}
