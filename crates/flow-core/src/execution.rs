//! Execution results published by the order executor.

use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of an execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed { reason: String },
}

impl ExecutionStatus {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }
}

/// The outcome of attempting an OrderRequest against an exchange.
///
/// Fanned out to two independent consumer groups (accounting and
/// notification); each sees the same message set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Execution id assigned by the executor.
    pub id: Uuid,
    /// Client order id of the originating request.
    pub order_id: Uuid,
    pub exchange: String,
    pub symbol: String,
    pub side: Side,
    #[serde(flatten)]
    pub status: ExecutionStatus,
    pub user_id: String,
    pub profit_loss: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// Idempotency key for the ledger append.
    ///
    /// Keyed on the order id so that at most one ledger entry can ever
    /// exist per order, no matter how often the result is redelivered.
    #[must_use]
    pub fn entry_key(&self) -> String {
        self.order_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_result(status: ExecutionStatus) -> ExecutionResult {
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

    #[test]
    fn test_status_wire_shape() {
        let result = sample_result(ExecutionStatus::Success);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");

        let failed = sample_result(ExecutionStatus::Failed {
            reason: "insufficient margin".to_string(),
        });
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "insufficient margin");
    }

    #[test]
    fn test_entry_key_stable_across_redelivery() {
        let result = sample_result(ExecutionStatus::Success);
        let redelivered: ExecutionResult =
            serde_json::from_str(&serde_json::to_string(&result).unwrap()).unwrap();
        assert_eq!(result.entry_key(), redelivered.entry_key());
    }
}
