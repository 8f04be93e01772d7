//! The order execution handler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use tracing::{info, warn};
use uuid::Uuid;

use crate::exchange::{ExchangeClient, ExchangeError};
use crate::ExecutorConfig;
use flow_core::envelope::kind;
use flow_core::{queues, Envelope, ExecutionResult, ExecutionStatus, OrderRequest};
use flow_telemetry::Metrics;
use flow_transport::{BoxFuture, Delivery, HandlerError, QueueHandler, QueueTransport};

/// Consumer for `order.request` (competing consumers).
///
/// Exactly one execution per client order id: results are cached by
/// order id for `result_ttl_secs`, so a redelivered request republishes
/// its result without touching the exchange. Transient venue errors
/// requeue the request; a venue rejection is a terminal outcome and
/// still produces an ExecutionResult so accounting and notification
/// hear about it.
pub struct OrderExecutor {
    transport: QueueTransport,
    exchange: Arc<dyn ExchangeClient>,
    config: ExecutorConfig,
    executed: DashMap<Uuid, (ExecutionResult, Instant)>,
}

impl OrderExecutor {
    #[must_use]
    pub fn new(
        transport: QueueTransport,
        exchange: Arc<dyn ExchangeClient>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            transport,
            exchange,
            config,
            executed: DashMap::new(),
        }
    }

    async fn process(&self, delivery: Delivery) -> Result<(), HandlerError> {
        let order: OrderRequest = delivery
            .envelope
            .open(kind::ORDER_REQUEST)
            .map_err(|e| HandlerError::Permanent(format!("not an order request: {e}")))?;

        // Redelivery of an already-executed order: republish the cached
        // result, never re-execute.
        if let Some(result) = self.cached_result(&order.id) {
            warn!(order_id = %order.id, "Redelivered order already executed, republishing result");
            Metrics::order("duplicate");
            return self.fan_out(&result);
        }

        let result = match self.exchange.execute(&order).await {
            Ok(fill) => {
                Metrics::order("success");
                self.result_for(&order, ExecutionStatus::Success, fill.profit_loss)
            }
            Err(e) if e.is_retryable() => {
                warn!(order_id = %order.id, error = %e, "Venue error, will retry");
                Metrics::order(match e {
                    ExchangeError::RateLimited => "rate_limited",
                    ExchangeError::PartialFill => "partial_fill",
                    _ => "timeout",
                });
                return Err(HandlerError::Transient(e.to_string()));
            }
            Err(ExchangeError::Rejected(reason)) => {
                warn!(order_id = %order.id, reason = %reason, "Order rejected by venue");
                Metrics::order("rejected");
                self.result_for(
                    &order,
                    ExecutionStatus::Failed { reason },
                    rust_decimal::Decimal::ZERO,
                )
            }
            // is_retryable covered these above.
            Err(e) => return Err(HandlerError::Transient(e.to_string())),
        };

        // Cache before publishing: if a fan-out publish fails, the
        // requeued request takes the republish path instead of
        // executing twice.
        self.cache(order.id, result.clone());
        self.fan_out(&result)?;

        info!(
            order_id = %result.order_id,
            execution_id = %result.id,
            symbol = %result.symbol,
            status = if result.status.is_success() { "success" } else { "failed" },
            profit_loss = %result.profit_loss,
            "Order executed"
        );
        Ok(())
    }

    /// Result for this order id, if executed within the TTL. Redelivery
    /// happens within the broker's retry window, so an expired entry is
    /// safe to forget; the ledger key still dedups downstream.
    fn cached_result(&self, id: &Uuid) -> Option<ExecutionResult> {
        let ttl = Duration::from_secs(self.config.result_ttl_secs);
        let hit = self
            .executed
            .get(id)
            .map(|e| (e.value().1.elapsed() < ttl).then(|| e.value().0.clone()));
        match hit {
            Some(Some(result)) => Some(result),
            Some(None) => {
                self.executed.remove(id);
                None
            }
            None => None,
        }
    }

    /// Record a result, pruning expired entries when the cache grows.
    fn cache(&self, id: Uuid, result: ExecutionResult) {
        if self.executed.len() >= 4_096 {
            let ttl = Duration::from_secs(self.config.result_ttl_secs);
            self.executed.retain(|_, (_, at)| at.elapsed() < ttl);
        }
        self.executed.insert(id, (result, Instant::now()));
    }

    /// Publish the result to both downstream queues. Accounting and
    /// notification each get their own copy so one consumer group
    /// cannot starve the other.
    fn fan_out(&self, result: &ExecutionResult) -> Result<(), HandlerError> {
        let envelope = Envelope::wrap(kind::EXECUTION_RESULT, result)
            .map_err(|e| HandlerError::Permanent(e.to_string()))?;
        self.transport
            .publish(queues::ORDER_EXECUTED, &envelope)
            .map_err(|e| HandlerError::Transient(e.to_string()))?;
        self.transport
            .publish(queues::ORDER_EXECUTED_NOTIFY, &envelope)
            .map_err(|e| HandlerError::Transient(e.to_string()))?;
        Ok(())
    }

    fn result_for(
        &self,
        order: &OrderRequest,
        status: ExecutionStatus,
        profit_loss: rust_decimal::Decimal,
    ) -> ExecutionResult {
        ExecutionResult {
            id: Uuid::new_v4(),
            order_id: order.id,
            exchange: self.exchange.name().to_string(),
            symbol: order.symbol.clone(),
            side: order.side,
            status,
            user_id: self.config.account.clone(),
            profit_loss,
            executed_at: Utc::now(),
        }
    }
}

impl QueueHandler for OrderExecutor {
    fn handle(&self, delivery: Delivery) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(self.process(delivery))
    }
}
