//! Order execution stage.
//!
//! Consumes order requests as a competing consumer, executes them
//! against an exchange behind the `ExchangeClient` seam, and fans the
//! result out to accounting and notification. The client order id makes
//! redelivered requests safe: an already-executed order republishes its
//! cached result instead of hitting the exchange again.

pub mod config;
pub mod exchange;
pub mod executor;

pub use config::ExecutorConfig;
pub use exchange::{
    exchange_for, ExchangeClient, ExchangeError, Fill, MockExchange, PaperExchange,
};
pub use executor::OrderExecutor;
