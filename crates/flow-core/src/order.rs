//! Order requests derived from filtered signals.

use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A decision to attempt a trade, derived from one Signal.
///
/// Consumed exactly once by one executor instance (competing consumers).
/// `id` doubles as the client order id sent to the exchange, which is
/// what makes redelivered requests safe to deduplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Client order id, stable across redeliveries.
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    /// Id of the signal this request was derived from.
    pub source_signal: Uuid,
    pub decided_at: DateTime<Utc>,
}

impl OrderRequest {
    #[must_use]
    pub fn new(symbol: String, side: Side, quantity: Decimal, source_signal: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol,
            side,
            quantity,
            source_signal,
            decided_at: Utc::now(),
        }
    }
}
