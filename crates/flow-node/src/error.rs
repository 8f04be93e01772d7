//! Error types for flow-node.

use thiserror::Error;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unknown exchange backend: {0}")]
    UnknownExchange(String),

    #[error("Broker error: {0}")]
    Broker(#[from] flow_broker::BrokerError),

    #[error("Transport error: {0}")]
    Transport(#[from] flow_transport::TransportError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] flow_telemetry::TelemetryError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] flow_ledger::LedgerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for application operations.
pub type AppResult<T> = std::result::Result<T, AppError>;
