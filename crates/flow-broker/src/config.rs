//! Broker configuration.

use serde::{Deserialize, Serialize};

/// Broker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Listen address (host:port; port 0 picks a free port).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Redelivery budget before a message moves to `<queue>.dead`.
    ///
    /// Counts nack-with-requeue and requeue-on-disconnect alike, so a
    /// poison message is seen at most `max_redeliveries + 1` times.
    #[serde(default = "default_max_redeliveries")]
    pub max_redeliveries: u32,
}

fn default_listen() -> String {
    "127.0.0.1:7410".to_string()
}

fn default_max_redeliveries() -> u32 {
    3
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_redeliveries: default_max_redeliveries(),
        }
    }
}
