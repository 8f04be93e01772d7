//! Append-only ledger entries.

use crate::execution::ExecutionResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A durable, append-only record of realized profit/loss tied to a user.
///
/// Exactly one entry per successful ExecutionResult (no duplicates, no
/// gaps) is the core correctness property of the accounting stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Idempotency key (the originating order id).
    pub entry_key: String,
    pub user_id: String,
    pub profit_loss: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// Map a successful execution to its ledger entry.
    ///
    /// Failed executions produce no entry; they are an escalation path,
    /// not a settlement.
    #[must_use]
    pub fn from_execution(result: &ExecutionResult) -> Option<Self> {
        if !result.status.is_success() {
            return None;
        }
        Some(Self {
            entry_key: result.entry_key(),
            user_id: result.user_id.clone(),
            profit_loss: result.profit_loss,
            timestamp: result.executed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionStatus;
    use crate::signal::Side;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_result(status: ExecutionStatus) -> ExecutionResult {
        ExecutionResult {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            exchange: "paper".to_string(),
            symbol: "ETHUSDT".to_string(),
            side: Side::Sell,
            status,
            user_id: "acct-1".to_string(),
            profit_loss: dec!(-3.25),
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn test_success_maps_to_entry() {
        let result = sample_result(ExecutionStatus::Success);
        let entry = LedgerEntry::from_execution(&result).unwrap();
        assert_eq!(entry.entry_key, result.order_id.to_string());
        assert_eq!(entry.profit_loss, dec!(-3.25));
    }

    #[test]
    fn test_failure_maps_to_none() {
        let result = sample_result(ExecutionStatus::Failed {
            reason: "rejected".to_string(),
        });
        assert!(LedgerEntry::from_execution(&result).is_none());
    }
}
