//! Processor stage configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Filter chain and order sizing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Symbols eligible for trading; anything else is dropped.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,
    /// Signals below this confidence are dropped.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: Decimal,
    /// Window within which a repeated dedup key is treated as the same
    /// signal.
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,
    /// Fixed quantity per order request.
    #[serde(default = "default_order_quantity")]
    pub order_quantity: Decimal,
}

fn default_symbols() -> Vec<String> {
    vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]
}

fn default_min_confidence() -> Decimal {
    // 0.7
    Decimal::new(7, 1)
}

fn default_dedup_ttl_secs() -> u64 {
    300
}

fn default_order_quantity() -> Decimal {
    // 0.01
    Decimal::new(1, 2)
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            min_confidence: default_min_confidence(),
            dedup_ttl_secs: default_dedup_ttl_secs(),
            order_quantity: default_order_quantity(),
        }
    }
}
