//! Fixed queue-name contract between pipeline stages.
//!
//! These strings are reused verbatim across producers and consumers;
//! renaming one is a wire-protocol change.

/// Raw signals as published by ingestion.
pub const SIGNAL_RECEIVED: &str = "signal.received";
/// Signals that passed filtering, for audit consumers.
pub const SIGNAL_FILTERED: &str = "signal.filtered";
/// Order requests awaiting execution (competing consumers).
pub const ORDER_REQUEST: &str = "order.request";
/// Execution results bound for accounting.
pub const ORDER_EXECUTED: &str = "order.executed";
/// Fan-out copy of execution results bound for notification.
pub const ORDER_EXECUTED_NOTIFY: &str = "order.executed.notify";
/// Position-close settlements (reserved, not yet produced).
pub const ORDER_CLOSED: &str = "order.closed";
/// Outbound email jobs (reserved for an external mail worker).
pub const NOTIFICATION_EMAIL: &str = "notification.email";
/// Outbound SSE frames (reserved for an external push worker).
pub const NOTIFICATION_SSE: &str = "notification.sse";

/// Dead-letter queue for messages that exhausted their retry budget.
#[must_use]
pub fn dead_letter(queue: &str) -> String {
    format!("{queue}.dead")
}
