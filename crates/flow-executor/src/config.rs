//! Executor stage configuration.

use serde::{Deserialize, Serialize};

/// Exchange selection and account identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Exchange backend name; the node selects the venue implementation
    /// from it at startup (see `exchange_for`).
    #[serde(default = "default_exchange")]
    pub exchange: String,
    /// Account the executor trades for; flows into the ledger as
    /// `user_id`.
    #[serde(default = "default_account")]
    pub account: String,
    /// How long an executed order id suppresses re-execution on
    /// redelivery. Also bounds the in-memory result cache.
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,
}

fn default_exchange() -> String {
    "paper".to_string()
}

fn default_account() -> String {
    "acct-1".to_string()
}

fn default_result_ttl_secs() -> u64 {
    600
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            account: default_account(),
            result_ttl_secs: default_result_ttl_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: ExecutorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.exchange, "paper");
        assert_eq!(config.account, "acct-1");
        assert_eq!(config.result_ttl_secs, 600);
    }
}
