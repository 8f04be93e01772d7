//! Connection retry policy.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded-backoff policy for broker connection establishment.
///
/// Also applied to mid-run reconnects; exhausting the budget there
/// closes the transport so the owning stage fails loudly instead of
/// stalling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectPolicy {
    /// Attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay between attempts; doubles per attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on the backoff delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ConnectPolicy {
    /// Backoff before the attempt following `attempt` (1-based), with
    /// a little jitter to spread competing reconnects.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(10);
        let delay = self
            .base_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_delay_ms);
        Duration::from_millis(delay + jitter())
    }
}

/// Jitter in 0..250 ms derived from the clock's subsecond nanos.
fn jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos % 250)
}
