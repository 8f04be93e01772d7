//! Ingestion stage configuration.

use serde::{Deserialize, Serialize};

/// Webhook server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Port for the webhook listener.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}
