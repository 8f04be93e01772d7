//! Telemetry for tradeflow stages.
//!
//! - structured logging initialization (JSON in production)
//! - Prometheus metric statics and the `Metrics` facade
//! - the ops HTTP server every stage mounts (`/health`, `/metrics`)

pub mod error;
pub mod logging;
pub mod metrics;
pub mod server;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use server::{ops_router, serve_ops};
