//! The accounting handler.

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::store::LedgerStore;
use flow_core::envelope::kind;
use flow_core::{ExecutionResult, LedgerEntry};
use flow_telemetry::Metrics;
use flow_transport::{BoxFuture, Delivery, HandlerError, QueueHandler};

/// Consumer for `order.executed`.
///
/// Success settles into the ledger (idempotent on the order id); a
/// failed execution is acked without an entry. Storage errors requeue
/// the message, and the key set guarantees the retry cannot
/// double-book anything that did land.
pub struct AccountingHandler {
    store: Mutex<LedgerStore>,
}

impl AccountingHandler {
    #[must_use]
    pub fn new(store: LedgerStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    fn settle(&self, delivery: &Delivery) -> Result<(), HandlerError> {
        let result: ExecutionResult = delivery
            .envelope
            .open(kind::EXECUTION_RESULT)
            .map_err(|e| HandlerError::Permanent(format!("not an execution result: {e}")))?;

        let Some(entry) = LedgerEntry::from_execution(&result) else {
            debug!(order_id = %result.order_id, "Failed execution, no ledger entry");
            return Ok(());
        };

        let written = self.store.lock().append(&entry).map_err(|e| {
            warn!(entry_key = %entry.entry_key, error = %e, "Ledger append failed");
            HandlerError::Transient(e.to_string())
        })?;

        if written {
            Metrics::ledger_entry();
            info!(
                entry_key = %entry.entry_key,
                user_id = %entry.user_id,
                profit_loss = %entry.profit_loss,
                "Ledger entry settled"
            );
        } else {
            Metrics::ledger_duplicate();
        }
        Ok(())
    }
}

impl QueueHandler for AccountingHandler {
    fn handle(&self, delivery: Delivery) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(async move { self.settle(&delivery) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flow_core::{queues, Envelope, ExecutionStatus, Side};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn handler(dir: &std::path::Path) -> AccountingHandler {
        AccountingHandler::new(LedgerStore::open(dir).unwrap())
    }

    fn result(status: ExecutionStatus) -> ExecutionResult {
        ExecutionResult {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            exchange: "paper".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            status,
            user_id: "acct-1".to_string(),
            profit_loss: dec!(12.5),
            executed_at: Utc::now(),
        }
    }

    fn delivery_of(result: &ExecutionResult) -> Delivery {
        Delivery {
            queue: queues::ORDER_EXECUTED.to_string(),
            redelivered: false,
            envelope: Envelope::wrap(kind::EXECUTION_RESULT, result).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_success_settles_once() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        let result = result(ExecutionStatus::Success);

        handler.handle(delivery_of(&result)).await.unwrap();
        // Redelivery of the same result.
        handler.handle(delivery_of(&result)).await.unwrap();

        let store = handler.store.lock();
        assert_eq!(store.len(), 1);
        assert!(store.contains(&result.order_id.to_string()));
    }

    #[tokio::test]
    async fn test_failed_execution_is_acked_without_entry() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        let result = result(ExecutionStatus::Failed {
            reason: "rejected".to_string(),
        });

        handler.handle(delivery_of(&result)).await.unwrap();
        assert!(handler.store.lock().is_empty());
    }

    #[tokio::test]
    async fn test_non_result_payload_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let handler = handler(dir.path());
        let delivery = Delivery {
            queue: queues::ORDER_EXECUTED.to_string(),
            redelivered: false,
            envelope: Envelope::wrap(kind::SIGNAL, &serde_json::json!({"x": 1})).unwrap(),
        };

        let err = handler.handle(delivery).await.unwrap_err();
        assert!(matches!(err, HandlerError::Permanent(_)));
    }
}
