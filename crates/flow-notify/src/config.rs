//! Notification stage configuration.

use serde::{Deserialize, Serialize};

/// Notification channels configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Port for the SSE endpoint.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Recipients for execution emails.
    #[serde(default = "default_recipients")]
    pub recipients: Vec<String>,
    /// Broadcast buffer; slow SSE clients miss frames beyond this.
    #[serde(default = "default_sse_buffer")]
    pub sse_buffer: usize,
}

fn default_port() -> u16 {
    8090
}

fn default_recipients() -> Vec<String> {
    vec!["ops@example.com".to_string()]
}

fn default_sse_buffer() -> usize {
    64
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            recipients: default_recipients(),
            sse_buffer: default_sse_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: NotifyConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.port, 8090);
        assert_eq!(config.sse_buffer, 64);
        assert!(!config.recipients.is_empty());
    }
}
