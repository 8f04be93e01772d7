//! Queue transport: connection lifecycle, publish and consume.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{TransportError, TransportResult};
use crate::handler::{Delivery, QueueHandler};
use crate::policy::ConnectPolicy;
use flow_broker::{ClientFrame, ServerFrame};
use flow_core::Envelope;
use flow_telemetry::Metrics;

/// Per-consumer options.
#[derive(Debug, Clone)]
pub struct ConsumeOptions {
    /// Bound on a single handler invocation; a timeout settles the
    /// message as transient (nack with requeue).
    pub handler_timeout: Duration,
}

impl Default for ConsumeOptions {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(30),
        }
    }
}

/// A delivery as routed off the wire, before envelope validation.
struct RawDelivery {
    tag: u64,
    redelivered: bool,
    body: serde_json::Value,
}

struct TransportInner {
    frame_tx: mpsc::UnboundedSender<ClientFrame>,
    consumers: DashMap<String, mpsc::UnboundedSender<RawDelivery>>,
    declared: DashMap<String, ()>,
    /// Fires when the reconnect budget is exhausted: the transport is
    /// permanently down and the owning stage should fail.
    closed: CancellationToken,
    /// Fires on user-requested close.
    shutdown: CancellationToken,
}

/// Owned, injectable handle to the broker connection.
///
/// Cloning shares the underlying connection; the io task keeps running
/// until `close()` or reconnect exhaustion.
#[derive(Clone)]
pub struct QueueTransport {
    inner: Arc<TransportInner>,
}

impl QueueTransport {
    /// Connect to the broker, retrying per `policy`.
    ///
    /// Exhausting the budget returns `ConnectFailed`; stages treat
    /// this as fatal at startup.
    pub async fn connect(url: &str, policy: ConnectPolicy) -> TransportResult<Self> {
        let stream = connect_with_retry(url, &policy).await?;
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(TransportInner {
            frame_tx,
            consumers: DashMap::new(),
            declared: DashMap::new(),
            closed: CancellationToken::new(),
            shutdown: CancellationToken::new(),
        });
        tokio::spawn(io_loop(
            inner.clone(),
            url.to_string(),
            policy,
            stream,
            frame_rx,
        ));
        Ok(Self { inner })
    }

    /// Publish an envelope.
    ///
    /// Declares the queue on first use (idempotent at the broker) and
    /// hands the message to the writer task; no delivery confirmation
    /// is awaited beyond that hand-off.
    pub fn publish(&self, queue: &str, envelope: &Envelope) -> TransportResult<()> {
        self.ensure_declared(queue)?;
        let body = serde_json::to_value(envelope)?;
        self.send(ClientFrame::Publish {
            queue: queue.to_string(),
            body,
        })?;
        Metrics::published(queue);
        Ok(())
    }

    /// Register `handler` as the sole processing function for `queue`.
    ///
    /// Every delivery runs under `options.handler_timeout` and is then
    /// settled: Ok acks; a transient error or timeout nacks with
    /// requeue; a permanent error nacks without.
    pub fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn QueueHandler>,
        options: ConsumeOptions,
    ) -> TransportResult<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<RawDelivery>();
        match self.inner.consumers.entry(queue.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(TransportError::ConsumerExists(queue.to_string()));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }
        self.ensure_declared(queue)?;
        self.send(ClientFrame::Consume {
            queue: queue.to_string(),
        })?;

        let transport = self.clone();
        let queue = queue.to_string();
        tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                transport
                    .dispatch(&queue, raw, handler.as_ref(), &options)
                    .await;
            }
        });
        Ok(())
    }

    /// Token that fires if the transport goes down for good.
    #[must_use]
    pub fn closed(&self) -> CancellationToken {
        self.inner.closed.clone()
    }

    /// Close the connection and stop the io task.
    pub fn close(&self) {
        self.inner.shutdown.cancel();
    }

    async fn dispatch(
        &self,
        queue: &str,
        raw: RawDelivery,
        handler: &dyn QueueHandler,
        options: &ConsumeOptions,
    ) {
        Metrics::consumed(queue);
        let envelope: Envelope = match serde_json::from_value(raw.body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(queue, tag = raw.tag, error = %e, "Unparseable message body, dead-lettering");
                self.settle(queue, raw.tag, Some(false));
                return;
            }
        };

        let delivery = Delivery {
            queue: queue.to_string(),
            redelivered: raw.redelivered,
            envelope,
        };
        let started = Instant::now();
        let outcome = tokio::time::timeout(options.handler_timeout, handler.handle(delivery)).await;
        Metrics::handler_latency(queue, started.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(())) => self.settle(queue, raw.tag, None),
            Ok(Err(e)) => {
                warn!(queue, tag = raw.tag, error = %e, "Handler failed");
                self.settle(queue, raw.tag, Some(e.requeue()));
            }
            Err(_) => {
                warn!(
                    queue,
                    tag = raw.tag,
                    timeout_ms = options.handler_timeout.as_millis() as u64,
                    "Handler timed out"
                );
                self.settle(queue, raw.tag, Some(true));
            }
        }
    }

    /// Settle a delivery: `None` acks, `Some(requeue)` nacks.
    fn settle(&self, queue: &str, tag: u64, nack_requeue: Option<bool>) {
        let frame = match nack_requeue {
            None => {
                Metrics::acked(queue);
                ClientFrame::Ack {
                    queue: queue.to_string(),
                    tag,
                }
            }
            Some(requeue) => {
                Metrics::nacked(queue, requeue);
                ClientFrame::Nack {
                    queue: queue.to_string(),
                    tag,
                    requeue,
                }
            }
        };
        if self.send(frame).is_err() {
            // Connection already torn down; the broker requeues the
            // unsettled delivery on disconnect.
            debug!(queue, tag, "Settle after close ignored");
        }
    }

    fn ensure_declared(&self, queue: &str) -> TransportResult<()> {
        if self.inner.declared.insert(queue.to_string(), ()).is_none() {
            self.send(ClientFrame::Declare {
                queue: queue.to_string(),
            })?;
        }
        Ok(())
    }

    fn send(&self, frame: ClientFrame) -> TransportResult<()> {
        self.inner
            .frame_tx
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }
}

async fn connect_with_retry(url: &str, policy: &ConnectPolicy) -> TransportResult<TcpStream> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match TcpStream::connect(url).await {
            Ok(stream) => {
                info!(url, attempt, "Broker connected");
                return Ok(stream);
            }
            Err(e) => {
                if attempt >= policy.max_attempts {
                    error!(url, attempt, error = %e, "Broker connection budget exhausted");
                    return Err(TransportError::ConnectFailed {
                        url: url.to_string(),
                        attempts: attempt,
                    });
                }
                Metrics::connect_retry();
                let delay = policy.delay(attempt);
                warn!(
                    url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Broker connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn write_frame(write_half: &mut OwnedWriteHalf, frame: &ClientFrame) -> std::io::Result<()> {
    let mut line = serde_json::to_string(frame).map_err(std::io::Error::other)?;
    line.push('\n');
    write_half.write_all(line.as_bytes()).await
}

/// Socket lifecycle task.
///
/// Runs the connected read/write loop; on connection loss it reconnects
/// with the bounded policy and replays queue declarations and consumer
/// registrations before resuming. Frames published while disconnected
/// buffer in the command channel.
async fn io_loop(
    inner: Arc<TransportInner>,
    url: String,
    policy: ConnectPolicy,
    first: TcpStream,
    mut frame_rx: mpsc::UnboundedReceiver<ClientFrame>,
) {
    let mut stream = Some(first);
    'session: loop {
        let s = match stream.take() {
            Some(s) => s,
            None => match connect_with_retry(&url, &policy).await {
                Ok(s) => s,
                Err(e) => {
                    error!(error = %e, "Reconnect budget exhausted, transport closed");
                    inner.closed.cancel();
                    return;
                }
            },
        };
        let (read_half, mut write_half) = s.into_split();

        // Replay state the broker lost with the old connection.
        for entry in inner.declared.iter() {
            let frame = ClientFrame::Declare {
                queue: entry.key().clone(),
            };
            if write_frame(&mut write_half, &frame).await.is_err() {
                continue 'session;
            }
        }
        for entry in inner.consumers.iter() {
            let frame = ClientFrame::Consume {
                queue: entry.key().clone(),
            };
            if write_frame(&mut write_half, &frame).await.is_err() {
                continue 'session;
            }
        }

        let mut lines = BufReader::new(read_half).lines();
        loop {
            tokio::select! {
                () = inner.shutdown.cancelled() => {
                    debug!("Transport closed by owner");
                    return;
                }
                frame = frame_rx.recv() => match frame {
                    Some(frame) => {
                        if write_frame(&mut write_half, &frame).await.is_err() {
                            warn!("Write failed, reconnecting");
                            continue 'session;
                        }
                    }
                    // All handles dropped.
                    None => return,
                },
                line = lines.next_line() => match line {
                    Ok(Some(line)) => route_delivery(&inner, &line),
                    Ok(None) => {
                        warn!("Broker connection closed, reconnecting");
                        continue 'session;
                    }
                    Err(e) => {
                        warn!(error = %e, "Broker read error, reconnecting");
                        continue 'session;
                    }
                }
            }
        }
    }
}

fn route_delivery(inner: &Arc<TransportInner>, line: &str) {
    let frame: ServerFrame = match serde_json::from_str(line) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "Malformed frame from broker dropped");
            return;
        }
    };
    let ServerFrame::Delivery {
        queue,
        tag,
        redelivered,
        body,
    } = frame;
    match inner.consumers.get(&queue) {
        Some(tx) => {
            if tx
                .send(RawDelivery {
                    tag,
                    redelivered,
                    body,
                })
                .is_err()
            {
                warn!(queue, tag, "Consumer task gone, delivery dropped");
            }
        }
        None => warn!(queue, tag, "Delivery for unregistered consumer dropped"),
    }
}
