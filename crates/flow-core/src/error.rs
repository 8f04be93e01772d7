//! Error types for flow-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported envelope version: expected {expected}, got {got}")]
    SchemaVersion { expected: u32, got: u32 },

    #[error("Unexpected message kind: expected {expected}, got {got}")]
    UnexpectedKind { expected: String, got: String },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
