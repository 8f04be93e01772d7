//! Mail delivery seam.
//!
//! Trait-based abstraction over the mail backend. This allows for:
//! - Dependency injection for testing
//! - Running without SMTP credentials (the default logs the mail)
//! - Swapping in a real relay later

use parking_lot::Mutex;
use tracing::info;

use flow_transport::BoxFuture;

/// A rendered email ready for hand-off to the backend.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// The mail backend seam: one call per email.
pub trait Mailer: Send + Sync {
    fn send(&self, email: OutboundEmail) -> BoxFuture<'_, Result<(), String>>;
}

/// Default backend: writes the mail to the log instead of a relay.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: OutboundEmail) -> BoxFuture<'_, Result<(), String>> {
        Box::pin(async move {
            info!(
                to = %email.to.join(","),
                subject = %email.subject,
                "Email (log backend)"
            );
            Ok(())
        })
    }
}

/// Test backend: records sends and optionally fails them all.
pub struct MockMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    fail: bool,
}

impl MockMailer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// A mailer whose every send fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    #[must_use]
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().clone()
    }
}

impl Default for MockMailer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailer for MockMailer {
    fn send(&self, email: OutboundEmail) -> BoxFuture<'_, Result<(), String>> {
        let result = if self.fail {
            Err("mock mailer down".to_string())
        } else {
            self.sent.lock().push(email);
            Ok(())
        };
        Box::pin(async move { result })
    }
}
