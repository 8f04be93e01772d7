//! Core domain types for the tradeflow pipeline.
//!
//! This crate provides the types shared by every stage:
//! - `Signal`: a raw trading indicator event from an external source
//! - `OrderRequest`: a decision to attempt a trade
//! - `ExecutionResult`: the outcome of attempting an order
//! - `LedgerEntry`: a durable record of realized profit/loss
//! - `Envelope`: the versioned wire wrapper around all of the above
//! - `queues`: the fixed queue-name contract between stages

pub mod envelope;
pub mod error;
pub mod execution;
pub mod ledger;
pub mod order;
pub mod queues;
pub mod signal;

pub use envelope::{Envelope, ENVELOPE_VERSION};
pub use error::{CoreError, Result};
pub use execution::{ExecutionResult, ExecutionStatus};
pub use ledger::LedgerEntry;
pub use order::OrderRequest;
pub use signal::{Side, Signal};
