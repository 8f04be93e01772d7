//! Raw trading signals as pushed by external providers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw trading indicator event received from an external source.
///
/// Produced once by Signal Ingestion and immutable from then on;
/// ownership transfers to the broker and then to the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    /// Id assigned at ingestion.
    pub id: Uuid,
    /// Provider identifier (e.g., "tv").
    pub source: String,
    /// Instrument symbol (e.g., "BTCUSDT").
    pub symbol: String,
    pub side: Side,
    /// Provider confidence in [0, 1].
    pub confidence: Decimal,
    /// The payload exactly as received, for audit and replay.
    #[serde(default)]
    pub raw_payload: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl Signal {
    /// Natural key for deduplication under at-least-once delivery.
    ///
    /// Stable across redeliveries because `received_at` travels inside
    /// the message rather than being re-stamped by the consumer.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.source,
            self.symbol,
            self.side,
            self.received_at.timestamp_millis()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_signal() -> Signal {
        Signal {
            id: Uuid::new_v4(),
            source: "tv".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            confidence: dec!(0.9),
            raw_payload: serde_json::json!({"strategy": "breakout"}),
            received_at: "2026-01-15T10:00:00Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_side_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"buy\"");
        let side: Side = serde_json::from_str("\"sell\"").unwrap();
        assert_eq!(side, Side::Sell);
    }

    #[test]
    fn test_dedup_key_stable_across_replay() {
        let signal = sample_signal();
        let replayed: Signal =
            serde_json::from_str(&serde_json::to_string(&signal).unwrap()).unwrap();
        assert_eq!(signal.dedup_key(), replayed.dedup_key());
    }

    #[test]
    fn test_dedup_key_distinguishes_side() {
        let buy = sample_signal();
        let mut sell = sample_signal();
        sell.side = Side::Sell;
        assert_ne!(buy.dedup_key(), sell.dedup_key());
    }
}
