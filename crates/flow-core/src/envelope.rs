//! Versioned wire envelope.
//!
//! Every message crossing the broker is wrapped in
//! `{version, kind, payload}` so stages can evolve independently and
//! reject shapes they do not understand at the boundary instead of
//! misparsing them.

use crate::error::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Current wire schema version.
pub const ENVELOPE_VERSION: u32 = 1;

/// Message kind identifiers.
pub mod kind {
    pub const SIGNAL: &str = "signal";
    pub const ORDER_REQUEST: &str = "order.request";
    pub const EXECUTION_RESULT: &str = "execution.result";
}

/// Wire wrapper around every queue message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    pub kind: String,
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Wrap a payload for publishing.
    pub fn wrap<T: Serialize>(kind: &str, payload: &T) -> Result<Self> {
        Ok(Self {
            version: ENVELOPE_VERSION,
            kind: kind.to_string(),
            payload: serde_json::to_value(payload)?,
        })
    }

    /// Unwrap a payload, checking version and kind first.
    pub fn open<T: DeserializeOwned>(&self, expected_kind: &str) -> Result<T> {
        if self.version != ENVELOPE_VERSION {
            return Err(CoreError::SchemaVersion {
                expected: ENVELOPE_VERSION,
                got: self.version,
            });
        }
        if self.kind != expected_kind {
            return Err(CoreError::UnexpectedKind {
                expected: expected_kind.to_string(),
                got: self.kind.clone(),
            });
        }
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{Side, Signal};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn sample_signal() -> Signal {
        Signal {
            id: Uuid::new_v4(),
            source: "tv".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            confidence: dec!(0.9),
            raw_payload: serde_json::Value::Null,
            received_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_wrap_open_roundtrip() {
        let signal = sample_signal();
        let envelope = Envelope::wrap(kind::SIGNAL, &signal).unwrap();
        assert_eq!(envelope.version, ENVELOPE_VERSION);

        let opened: Signal = envelope.open(kind::SIGNAL).unwrap();
        assert_eq!(opened.id, signal.id);
    }

    #[test]
    fn test_open_rejects_wrong_kind() {
        let envelope = Envelope::wrap(kind::SIGNAL, &sample_signal()).unwrap();
        let err = envelope.open::<Signal>(kind::ORDER_REQUEST).unwrap_err();
        assert!(matches!(err, CoreError::UnexpectedKind { .. }));
    }

    #[test]
    fn test_open_rejects_future_version() {
        let mut envelope = Envelope::wrap(kind::SIGNAL, &sample_signal()).unwrap();
        envelope.version = 2;
        let err = envelope.open::<Signal>(kind::SIGNAL).unwrap_err();
        assert!(matches!(err, CoreError::SchemaVersion { .. }));
    }
}
