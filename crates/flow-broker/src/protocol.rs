//! Wire protocol frames.
//!
//! Frames are single JSON objects, one per line. The `op` tag selects
//! the variant. Bodies are opaque JSON values; the broker never looks
//! inside a message payload.

use serde::{Deserialize, Serialize};

/// Frames sent client -> broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Ensure a queue exists. Idempotent.
    Declare { queue: String },
    /// Append a message to a queue.
    Publish {
        queue: String,
        body: serde_json::Value,
    },
    /// Register this connection as a consumer of a queue.
    ///
    /// One consumer per queue per connection; one message in flight per
    /// consumer until acked or nacked.
    Consume { queue: String },
    /// Settle a delivery: remove the message permanently.
    Ack { queue: String, tag: u64 },
    /// Settle a delivery negatively.
    ///
    /// `requeue = true` returns the message to the front of the queue
    /// (counted against its redelivery budget); `requeue = false` moves
    /// it straight to the dead-letter queue.
    Nack {
        queue: String,
        tag: u64,
        requeue: bool,
    },
}

/// Frames sent broker -> client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServerFrame {
    /// A message handed to this connection's consumer on `queue`.
    ///
    /// The message stays in flight until the client settles `tag`.
    Delivery {
        queue: String,
        tag: u64,
        redelivered: bool,
        body: serde_json::Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_frame_wire_shape() {
        let frame = ClientFrame::Nack {
            queue: "order.request".to_string(),
            tag: 7,
            requeue: true,
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["op"], "nack");
        assert_eq!(json["tag"], 7);
        assert_eq!(json["requeue"], true);
    }

    #[test]
    fn test_delivery_roundtrip() {
        let frame = ServerFrame::Delivery {
            queue: "signal.received".to_string(),
            tag: 1,
            redelivered: false,
            body: serde_json::json!({"version": 1}),
        };
        let line = serde_json::to_string(&frame).unwrap();
        let parsed: ServerFrame = serde_json::from_str(&line).unwrap();
        let ServerFrame::Delivery { queue, tag, .. } = parsed;
        assert_eq!(queue, "signal.received");
        assert_eq!(tag, 1);
    }

    #[test]
    fn test_unknown_op_rejected() {
        let result: Result<ClientFrame, _> =
            serde_json::from_str(r#"{"op":"purge","queue":"signal.received"}"#);
        assert!(result.is_err());
    }
}
