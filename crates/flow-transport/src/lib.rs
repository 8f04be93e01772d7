//! Client-side queue transport.
//!
//! Owns the broker connection for a stage process and exposes the two
//! pipeline primitives:
//! - `publish(queue, envelope)` — fire-and-forget past hand-off to the
//!   socket writer
//! - `consume(queue, handler)` — at-least-once delivery under the
//!   ack/nack contract, with a bounded per-message timeout
//!
//! Connection establishment retries with bounded backoff; mid-run
//! disconnects reconnect with the same budget and replay queue
//! declarations and consumer registrations.

pub mod error;
pub mod handler;
pub mod policy;
pub mod transport;

pub use error::{TransportError, TransportResult};
pub use handler::{BoxFuture, Delivery, HandlerError, QueueHandler};
pub use policy::ConnectPolicy;
pub use transport::{ConsumeOptions, QueueTransport};
