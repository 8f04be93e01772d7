//! Main application orchestration.
//!
//! Wires the enabled stages to the broker:
//! - embedded broker (optional)
//! - one shared transport, one consumer per stage queue
//! - HTTP surfaces: webhook, SSE, and a standalone ops port

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::NodeConfig;
use crate::error::{AppError, AppResult};
use flow_broker::Broker;
use flow_core::queues;
use flow_executor::{exchange_for, OrderExecutor};
use flow_ingest::{ingest_router, IngestState};
use flow_ledger::{AccountingHandler, LedgerStore};
use flow_notify::{notify_router, LogMailer, NotificationHandler, NotifyState, SseBroadcaster};
use flow_processor::SignalProcessor;
use flow_telemetry::{ops_router, serve_ops};
use flow_transport::{ConsumeOptions, QueueTransport};

/// Main application.
pub struct Application {
    config: NodeConfig,
    shutdown: CancellationToken,
}

impl Application {
    #[must_use]
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the node when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until ctrl-c, external shutdown, or transport loss.
    pub async fn run(&self) -> AppResult<()> {
        let broker = if self.config.embedded_broker {
            Some(Broker::bind(self.config.broker.clone()).await?)
        } else {
            None
        };
        let broker_url = match &broker {
            // Port 0 in config resolves at bind time.
            Some(broker) => broker.addr().to_string(),
            None => self.config.broker.listen.clone(),
        };

        let transport =
            QueueTransport::connect(&broker_url, self.config.connect.clone()).await?;
        info!(broker = %broker_url, embedded = broker.is_some(), "Node connected");

        let stages = &self.config.stages;
        if stages.processor {
            let processor =
                SignalProcessor::new(transport.clone(), self.config.processor.clone());
            transport.consume(
                queues::SIGNAL_RECEIVED,
                Arc::new(processor),
                ConsumeOptions::default(),
            )?;
        }
        if stages.executor {
            let exchange = exchange_for(&self.config.executor.exchange).ok_or_else(|| {
                AppError::UnknownExchange(self.config.executor.exchange.clone())
            })?;
            let executor =
                OrderExecutor::new(transport.clone(), exchange, self.config.executor.clone());
            transport.consume(
                queues::ORDER_REQUEST,
                Arc::new(executor),
                ConsumeOptions::default(),
            )?;
        }
        if stages.ledger {
            let store = LedgerStore::open(&self.config.ledger.data_dir)?;
            transport.consume(
                queues::ORDER_EXECUTED,
                Arc::new(AccountingHandler::new(store)),
                ConsumeOptions::default(),
            )?;
        }
        if stages.notify {
            let hub = SseBroadcaster::new(self.config.notify.sse_buffer);
            let handler = NotificationHandler::new(
                Arc::new(LogMailer),
                hub.clone(),
                self.config.notify.clone(),
            );
            transport.consume(
                queues::ORDER_EXECUTED_NOTIFY,
                Arc::new(handler),
                ConsumeOptions::default(),
            )?;
            serve_ops(
                notify_router(NotifyState::new(hub)).merge(ops_router()),
                self.config.notify.port,
                self.shutdown.clone(),
            )
            .await?;
        }
        if stages.ingest {
            serve_ops(
                ingest_router(IngestState::new(transport.clone())).merge(ops_router()),
                self.config.ingest.port,
                self.shutdown.clone(),
            )
            .await?;
        }
        serve_ops(ops_router(), self.config.ops_port, self.shutdown.clone()).await?;

        let closed = transport.closed();
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-c received, shutting down");
                self.shutdown.cancel();
            }
            () = self.shutdown.cancelled() => {
                info!("Shutdown requested");
            }
            () = closed.cancelled() => {
                error!("Broker transport lost for good, shutting down");
                self.shutdown.cancel();
                transport.close();
                if let Some(broker) = broker {
                    broker.shutdown();
                }
                return Err(flow_transport::TransportError::Closed.into());
            }
        }

        transport.close();
        if let Some(broker) = broker {
            broker.shutdown();
        }
        info!("Node stopped");
        Ok(())
    }
}
