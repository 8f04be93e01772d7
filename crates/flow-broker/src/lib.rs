//! Durable message broker for the tradeflow pipeline.
//!
//! A small queue broker speaking newline-delimited JSON frames over TCP:
//! named FIFO queues, competing consumers with one message in flight per
//! consumer, delivery tags with an ack/nack contract, redelivery on
//! consumer disconnect, and bounded redelivery with dead-letter queues.
//!
//! Stages connect through `flow-transport`; this crate is the server
//! side and the queue state machine.

pub mod config;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod server;

pub use config::BrokerConfig;
pub use error::{BrokerError, BrokerResult};
pub use protocol::{ClientFrame, ServerFrame};
pub use server::Broker;
