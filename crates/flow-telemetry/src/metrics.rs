//! Prometheus metrics for the tradeflow pipeline.
//!
//! Covers the broker transport (publish/consume/ack/nack), each stage's
//! domain counters, and handler latency.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration
//! fails, it indicates a fatal configuration error (e.g., duplicate
//! metric names) that should crash at startup rather than fail silently.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    CounterVec, HistogramVec, IntCounter, IntGauge,
};

/// Messages published, by queue.
pub static PUBLISHED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "flow_published_total",
        "Total messages published to the broker",
        &["queue"]
    )
    .unwrap()
});

/// Messages delivered to a handler, by queue.
pub static CONSUMED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "flow_consumed_total",
        "Total messages delivered to a consumer handler",
        &["queue"]
    )
    .unwrap()
});

/// Messages acknowledged, by queue.
pub static ACKED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "flow_acked_total",
        "Total messages acknowledged",
        &["queue"]
    )
    .unwrap()
});

/// Messages negatively acknowledged, by queue and requeue decision.
pub static NACKED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "flow_nacked_total",
        "Total messages negatively acknowledged",
        &["queue", "requeue"]
    )
    .unwrap()
});

/// Messages moved to a dead-letter queue, by origin queue.
pub static DEAD_LETTERED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "flow_dead_lettered_total",
        "Total messages moved to a dead-letter queue",
        &["queue"]
    )
    .unwrap()
});

/// Broker connection attempts that had to be retried.
pub static CONNECT_RETRIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "flow_connect_retries_total",
        "Total broker connection retries"
    )
    .unwrap()
});

/// Handler latency by queue.
pub static HANDLER_LATENCY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "flow_handler_latency_seconds",
        "Consumer handler latency in seconds",
        &["queue"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
    )
    .unwrap()
});

/// Webhook signals by outcome (accepted/rejected/publish_failed).
pub static SIGNALS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "flow_signals_total",
        "Total signals received at the webhook, by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Processor decisions (passed/filtered/duplicate/malformed).
pub static PROCESSOR_DECISIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "flow_processor_decisions_total",
        "Total signal processor decisions, by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Order executions by outcome (success/rate_limited/timeout/rejected/duplicate).
pub static ORDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "flow_orders_total",
        "Total order execution attempts, by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Ledger entries appended.
pub static LEDGER_ENTRIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "flow_ledger_entries_total",
        "Total ledger entries appended"
    )
    .unwrap()
});

/// Redelivered execution results skipped by the ledger idempotency key.
pub static LEDGER_DUPLICATES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "flow_ledger_duplicates_total",
        "Total duplicate execution results skipped by the ledger"
    )
    .unwrap()
});

/// Notification emails by outcome (sent/failed).
pub static EMAILS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "flow_emails_total",
        "Total notification emails, by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Currently connected SSE subscribers.
pub static SSE_CLIENTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "flow_sse_clients",
        "Currently connected SSE subscribers"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn published(queue: &str) {
        PUBLISHED_TOTAL.with_label_values(&[queue]).inc();
    }

    pub fn consumed(queue: &str) {
        CONSUMED_TOTAL.with_label_values(&[queue]).inc();
    }

    pub fn acked(queue: &str) {
        ACKED_TOTAL.with_label_values(&[queue]).inc();
    }

    pub fn nacked(queue: &str, requeue: bool) {
        NACKED_TOTAL
            .with_label_values(&[queue, if requeue { "true" } else { "false" }])
            .inc();
    }

    pub fn dead_lettered(queue: &str) {
        DEAD_LETTERED_TOTAL.with_label_values(&[queue]).inc();
    }

    pub fn connect_retry() {
        CONNECT_RETRIES_TOTAL.inc();
    }

    pub fn handler_latency(queue: &str, seconds: f64) {
        HANDLER_LATENCY_SECONDS
            .with_label_values(&[queue])
            .observe(seconds);
    }

    pub fn signal(outcome: &str) {
        SIGNALS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn processor_decision(outcome: &str) {
        PROCESSOR_DECISIONS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn order(outcome: &str) {
        ORDERS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn ledger_entry() {
        LEDGER_ENTRIES_TOTAL.inc();
    }

    pub fn ledger_duplicate() {
        LEDGER_DUPLICATES_TOTAL.inc();
    }

    pub fn email(outcome: &str) {
        EMAILS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn sse_client_connected() {
        SSE_CLIENTS.inc();
    }

    pub fn sse_client_disconnected() {
        SSE_CLIENTS.dec();
    }
}
