//! Error types for flow-transport.

use thiserror::Error;

/// Transport error types.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Broker connection to {url} failed after {attempts} attempts")]
    ConnectFailed { url: String, attempts: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport is closed")]
    Closed,

    #[error("A consumer is already registered for queue {0}")]
    ConsumerExists(String),
}

/// Result type alias for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;
