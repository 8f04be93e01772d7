//! Exchange client trait for order execution.
//!
//! Trait-based abstraction over the venue an order is sent to. This
//! allows for:
//! - Dependency injection for testing
//! - Running the pipeline against a simulated venue (paper trading)
//! - Swapping in a real venue connector later

use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

use flow_core::OrderRequest;
use flow_transport::BoxFuture;

/// A filled order as reported by the venue.
#[derive(Debug, Clone)]
pub struct Fill {
    /// Realized profit/loss attributed to this fill.
    pub profit_loss: Decimal,
}

/// Why an execution attempt failed.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    /// Venue throttled us; the same request succeeds later.
    #[error("rate limited")]
    RateLimited,
    /// No response in time; outcome unknown, safe to retry because the
    /// client order id dedups venue-side.
    #[error("request timed out")]
    Timeout,
    /// Only part of the quantity filled before the order expired; the
    /// remainder is retried under the same client order id.
    #[error("partial fill")]
    PartialFill,
    /// Venue refused the order (bad symbol, insufficient margin).
    /// Retrying the same request cannot succeed.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl ExchangeError {
    /// Check if the error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::RateLimited | ExchangeError::Timeout | ExchangeError::PartialFill
        )
    }
}

/// The venue seam: one call per order request.
pub trait ExchangeClient: Send + Sync {
    fn execute(&self, order: &OrderRequest) -> BoxFuture<'_, Result<Fill, ExchangeError>>;

    /// Venue name recorded on execution results.
    fn name(&self) -> &str;
}

/// Select the venue implementation from its configured name.
///
/// `paper` is the only built-in backend; an unknown name is a startup
/// error for the caller, not a silent fallback.
#[must_use]
pub fn exchange_for(name: &str) -> Option<Arc<dyn ExchangeClient>> {
    match name {
        "paper" => Some(Arc::new(PaperExchange)),
        _ => None,
    }
}

/// Simulated venue that fills every order at a flat edge per unit.
///
/// Deterministic so pipeline behavior is reproducible end to end
/// without venue connectivity.
pub struct PaperExchange;

/// Simulated profit per unit of quantity.
const PAPER_EDGE: Decimal = dec!(1250);

impl ExchangeClient for PaperExchange {
    fn execute(&self, order: &OrderRequest) -> BoxFuture<'_, Result<Fill, ExchangeError>> {
        let profit_loss = order.quantity * PAPER_EDGE;
        Box::pin(async move { Ok(Fill { profit_loss }) })
    }

    fn name(&self) -> &str {
        "paper"
    }
}

/// Scripted exchange for tests: pops results front-to-back and records
/// every order it saw.
pub struct MockExchange {
    script: Mutex<Vec<Result<Fill, ExchangeError>>>,
    calls: Mutex<Vec<OrderRequest>>,
}

impl MockExchange {
    /// `script` is consumed in order; once empty, every call fills at
    /// zero profit.
    #[must_use]
    pub fn new(script: Vec<Result<Fill, ExchangeError>>) -> Self {
        Self {
            script: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<OrderRequest> {
        self.calls.lock().clone()
    }
}

impl ExchangeClient for MockExchange {
    fn execute(&self, order: &OrderRequest) -> BoxFuture<'_, Result<Fill, ExchangeError>> {
        self.calls.lock().push(order.clone());
        let result = {
            let mut script = self.script.lock();
            if script.is_empty() {
                Ok(Fill {
                    profit_loss: Decimal::ZERO,
                })
            } else {
                script.remove(0)
            }
        };
        Box::pin(async move { result })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
