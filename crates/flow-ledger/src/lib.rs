//! Accounting stage.
//!
//! Consumes execution results and settles them into an append-only
//! JSON Lines ledger, one daily file. The entry key (the originating
//! order id) makes the append idempotent, which is what turns
//! at-least-once delivery into exactly-one entry per order.

pub mod config;
pub mod error;
pub mod handler;
pub mod store;

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use handler::AccountingHandler;
pub use store::LedgerStore;
