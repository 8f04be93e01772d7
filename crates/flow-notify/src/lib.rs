//! Notification stage.
//!
//! Consumes the notification copy of execution results and pushes them
//! out on two channels: email (behind the `Mailer` seam) and a
//! server-sent-events endpoint for browsers. Delivery here is
//! best-effort by design; the accounting stage owns correctness, so a
//! mail failure never requeues the message or suppresses the SSE push.

pub mod config;
pub mod handler;
pub mod mailer;
pub mod server;
pub mod sse;

pub use config::NotifyConfig;
pub use handler::NotificationHandler;
pub use mailer::{LogMailer, Mailer, MockMailer, OutboundEmail};
pub use server::{notify_router, NotifyState};
pub use sse::SseBroadcaster;
