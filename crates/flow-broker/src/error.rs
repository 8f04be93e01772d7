//! Error types for flow-broker.

use thiserror::Error;

/// Broker error types.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
}

/// Result type alias for broker operations.
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;
