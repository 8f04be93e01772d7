//! Consumer handler seam.
//!
//! Stages implement `QueueHandler`; the transport wraps every
//! invocation in the ack/nack contract. The handler's error class
//! decides the settle: transient failures requeue (counted against the
//! broker's redelivery budget), permanent ones dead-letter immediately.

use std::pin::Pin;

use flow_core::Envelope;
use thiserror::Error;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// How a failed handler invocation should be settled.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Worth retrying: broker redelivers until the budget runs out.
    #[error("transient failure: {0}")]
    Transient(String),
    /// Retrying cannot help (malformed payload, rejected order):
    /// dead-letter immediately.
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl HandlerError {
    #[must_use]
    pub fn requeue(&self) -> bool {
        matches!(self, HandlerError::Transient(_))
    }
}

/// One message handed to a consumer.
///
/// The envelope has already passed wire-shape validation; semantic
/// validation (kind, payload shape) is the handler's job.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub queue: String,
    /// True if the broker delivered this message before.
    pub redelivered: bool,
    pub envelope: Envelope,
}

/// The sole processing function for every message on a queue.
pub trait QueueHandler: Send + Sync {
    fn handle(&self, delivery: Delivery) -> BoxFuture<'_, Result<(), HandlerError>>;
}
