//! The filter chain and order decision handler.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, warn};

use flow_core::envelope::kind;
use flow_core::{queues, Envelope, OrderRequest, Signal};
use flow_telemetry::Metrics;
use flow_transport::{BoxFuture, Delivery, HandlerError, QueueHandler, QueueTransport};

/// Consumer for `signal.received`.
///
/// For each signal, exactly one of four outcomes:
/// - `malformed`: payload is not a Signal; dead-lettered
/// - `duplicate`: same dedup key seen within the TTL; acked and dropped
/// - `filtered`: off-whitelist symbol or low confidence; acked and dropped
/// - `passed`: republished to `signal.filtered` plus an OrderRequest to
///   `order.request`
pub struct SignalProcessor {
    transport: QueueTransport,
    config: crate::ProcessorConfig,
    seen: DashMap<String, Instant>,
}

impl SignalProcessor {
    #[must_use]
    pub fn new(transport: QueueTransport, config: crate::ProcessorConfig) -> Self {
        Self {
            transport,
            config,
            seen: DashMap::new(),
        }
    }

    /// True if this dedup key was recorded within the TTL.
    fn is_duplicate(&self, key: &str) -> bool {
        let ttl = Duration::from_secs(self.config.dedup_ttl_secs);
        let fresh = self.seen.get(key).map(|at| at.elapsed() < ttl);
        match fresh {
            Some(true) => true,
            Some(false) => {
                self.seen.remove(key);
                false
            }
            None => false,
        }
    }

    /// Record a dedup key, pruning expired entries when the map grows.
    fn record(&self, key: String) {
        if self.seen.len() >= 4_096 {
            let ttl = Duration::from_secs(self.config.dedup_ttl_secs);
            self.seen.retain(|_, at| at.elapsed() < ttl);
        }
        self.seen.insert(key, Instant::now());
    }

    async fn process(&self, delivery: Delivery) -> Result<(), HandlerError> {
        let signal: Signal = delivery.envelope.open(kind::SIGNAL).map_err(|e| {
            Metrics::processor_decision("malformed");
            HandlerError::Permanent(format!("not a signal: {e}"))
        })?;

        let dedup_key = signal.dedup_key();
        if self.is_duplicate(&dedup_key) {
            debug!(signal_id = %signal.id, dedup_key = %dedup_key, "Duplicate signal dropped");
            Metrics::processor_decision("duplicate");
            return Ok(());
        }

        if !self.config.symbols.contains(&signal.symbol) {
            debug!(signal_id = %signal.id, symbol = %signal.symbol, "Off-whitelist signal dropped");
            Metrics::processor_decision("filtered");
            return Ok(());
        }
        if signal.confidence < self.config.min_confidence {
            debug!(
                signal_id = %signal.id,
                confidence = %signal.confidence,
                floor = %self.config.min_confidence,
                "Low-confidence signal dropped"
            );
            Metrics::processor_decision("filtered");
            return Ok(());
        }

        let order = OrderRequest::new(
            signal.symbol.clone(),
            signal.side,
            self.config.order_quantity,
            signal.id,
        );

        // Both publishes must land before the signal is acked; a failed
        // publish requeues the signal and the dedup key stays unrecorded
        // so the retry is not suppressed.
        let publish = || -> Result<(), HandlerError> {
            self.transport
                .publish(queues::SIGNAL_FILTERED, &delivery.envelope)
                .map_err(transient)?;
            let envelope =
                Envelope::wrap(kind::ORDER_REQUEST, &order).map_err(|e| {
                    warn!(error = %e, "Order serialization failed");
                    HandlerError::Permanent(e.to_string())
                })?;
            self.transport
                .publish(queues::ORDER_REQUEST, &envelope)
                .map_err(transient)?;
            Ok(())
        };
        publish()?;

        self.record(dedup_key);
        info!(
            signal_id = %signal.id,
            order_id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            quantity = %order.quantity,
            "Signal passed, order requested"
        );
        Metrics::processor_decision("passed");
        Ok(())
    }
}

fn transient(e: flow_transport::TransportError) -> HandlerError {
    HandlerError::Transient(e.to_string())
}

impl QueueHandler for SignalProcessor {
    fn handle(&self, delivery: Delivery) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(self.process(delivery))
    }
}
