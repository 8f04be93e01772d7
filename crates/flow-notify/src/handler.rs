//! The notification handler.

use std::sync::Arc;

use tracing::{info, warn};

use crate::mailer::{Mailer, OutboundEmail};
use crate::sse::{NotificationFrame, SseBroadcaster};
use crate::NotifyConfig;
use flow_core::envelope::kind;
use flow_core::{ExecutionResult, ExecutionStatus};
use flow_telemetry::Metrics;
use flow_transport::{BoxFuture, Delivery, HandlerError, QueueHandler};

/// Consumer for `order.executed.notify`.
///
/// Email and SSE are attempted independently; a failure on one channel
/// never suppresses the other, and neither failure requeues the
/// message. Only an unparseable payload is an error, and that one is
/// permanent.
pub struct NotificationHandler {
    mailer: Arc<dyn Mailer>,
    broadcaster: SseBroadcaster,
    config: NotifyConfig,
}

impl NotificationHandler {
    #[must_use]
    pub fn new(mailer: Arc<dyn Mailer>, broadcaster: SseBroadcaster, config: NotifyConfig) -> Self {
        Self {
            mailer,
            broadcaster,
            config,
        }
    }

    async fn notify(&self, delivery: Delivery) -> Result<(), HandlerError> {
        let result: ExecutionResult = delivery
            .envelope
            .open(kind::EXECUTION_RESULT)
            .map_err(|e| HandlerError::Permanent(format!("not an execution result: {e}")))?;

        match self.mailer.send(render_email(&self.config.recipients, &result)).await {
            Ok(()) => Metrics::email("sent"),
            Err(e) => {
                warn!(order_id = %result.order_id, error = %e, "Email send failed");
                Metrics::email("failed");
            }
        }

        self.broadcaster.publish(&render_frame(&result));

        info!(
            order_id = %result.order_id,
            symbol = %result.symbol,
            "Notification dispatched"
        );
        Ok(())
    }
}

impl QueueHandler for NotificationHandler {
    fn handle(&self, delivery: Delivery) -> BoxFuture<'_, Result<(), HandlerError>> {
        Box::pin(self.notify(delivery))
    }
}

fn status_line(result: &ExecutionResult) -> String {
    match &result.status {
        ExecutionStatus::Success => format!("filled, P/L {}", result.profit_loss),
        ExecutionStatus::Failed { reason } => format!("failed: {reason}"),
    }
}

fn render_email(recipients: &[String], result: &ExecutionResult) -> OutboundEmail {
    OutboundEmail {
        to: recipients.to_vec(),
        subject: format!(
            "[tradeflow] {} {} {}",
            result.symbol,
            result.side,
            if result.status.is_success() {
                "executed"
            } else {
                "failed"
            }
        ),
        body: format!(
            "Order {} on {} ({} {}): {}\nExecuted at {}",
            result.order_id,
            result.exchange,
            result.side,
            result.symbol,
            status_line(result),
            result.executed_at.to_rfc3339(),
        ),
    }
}

fn render_frame(result: &ExecutionResult) -> NotificationFrame {
    NotificationFrame {
        order_id: result.order_id.to_string(),
        symbol: result.symbol.clone(),
        side: result.side.to_string(),
        status: if result.status.is_success() {
            "success".to_string()
        } else {
            "failed".to_string()
        },
        profit_loss: result.profit_loss.to_string(),
        executed_at: result.executed_at.to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailer::MockMailer;
    use chrono::Utc;
    use flow_core::{queues, Envelope, Side};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn result() -> ExecutionResult {
        ExecutionResult {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            exchange: "paper".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            status: ExecutionStatus::Success,
            user_id: "acct-1".to_string(),
            profit_loss: dec!(12.5),
            executed_at: Utc::now(),
        }
    }

    fn delivery_of(result: &ExecutionResult) -> Delivery {
        Delivery {
            queue: queues::ORDER_EXECUTED_NOTIFY.to_string(),
            redelivered: false,
            envelope: Envelope::wrap(kind::EXECUTION_RESULT, result).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_email_and_sse_both_fire() {
        let mailer = Arc::new(MockMailer::new());
        let hub = SseBroadcaster::new(16);
        let mut rx = hub.subscribe();
        let handler =
            NotificationHandler::new(mailer.clone(), hub, NotifyConfig::default());

        handler.handle(delivery_of(&result())).await.unwrap();

        assert_eq!(mailer.sent().len(), 1);
        assert!(mailer.sent()[0].subject.contains("BTCUSDT"));
        assert!(rx.recv().await.unwrap().contains("12.5"));
    }

    #[tokio::test]
    async fn test_mailer_failure_does_not_suppress_sse() {
        let mailer = Arc::new(MockMailer::failing());
        let hub = SseBroadcaster::new(16);
        let mut rx = hub.subscribe();
        let handler = NotificationHandler::new(mailer, hub, NotifyConfig::default());

        // Still Ok: best-effort channels never requeue.
        handler.handle(delivery_of(&result())).await.unwrap();

        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_execution_still_notifies() {
        let mailer = Arc::new(MockMailer::new());
        let hub = SseBroadcaster::new(16);
        let handler =
            NotificationHandler::new(mailer.clone(), hub, NotifyConfig::default());

        let mut failed = result();
        failed.status = ExecutionStatus::Failed {
            reason: "insufficient margin".to_string(),
        };
        handler.handle(delivery_of(&failed)).await.unwrap();

        assert!(mailer.sent()[0].body.contains("insufficient margin"));
    }

    #[tokio::test]
    async fn test_non_result_payload_is_permanent() {
        let handler = NotificationHandler::new(
            Arc::new(MockMailer::new()),
            SseBroadcaster::new(16),
            NotifyConfig::default(),
        );
        let delivery = Delivery {
            queue: queues::ORDER_EXECUTED_NOTIFY.to_string(),
            redelivered: false,
            envelope: Envelope::wrap(kind::SIGNAL, &serde_json::json!({"x": 1})).unwrap(),
        };

        let err = handler.handle(delivery).await.unwrap_err();
        assert!(matches!(err, HandlerError::Permanent(_)));
    }
}
