//! TCP front end for the broker.
//!
//! One task per connection: a reader parsing newline-delimited frames
//! and a writer draining that connection's delivery channel. All state
//! changes go through the shared `QueueTable` under a single lock.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::error::BrokerResult;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::queue::QueueTable;

struct Inner {
    table: Mutex<QueueTable>,
    next_conn_id: AtomicU64,
}

/// A running broker instance.
pub struct Broker {
    inner: Arc<Inner>,
    addr: SocketAddr,
    shutdown: CancellationToken,
}

impl Broker {
    /// Bind the listen address and start accepting connections.
    ///
    /// Port 0 in `config.listen` picks a free port; the bound address
    /// is available via `addr()`.
    pub async fn bind(config: BrokerConfig) -> BrokerResult<Self> {
        let listener = TcpListener::bind(&config.listen).await?;
        let addr = listener.local_addr()?;
        let inner = Arc::new(Inner {
            table: Mutex::new(QueueTable::new(config.max_redeliveries)),
            next_conn_id: AtomicU64::new(1),
        });
        let shutdown = CancellationToken::new();

        info!(%addr, max_redeliveries = config.max_redeliveries, "Broker listening");

        let accept_inner = inner.clone();
        let accept_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = accept_shutdown.cancelled() => break,
                    accepted = listener.accept() => match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "Connection accepted");
                            let inner = accept_inner.clone();
                            let shutdown = accept_shutdown.clone();
                            tokio::spawn(handle_connection(inner, stream, shutdown));
                        }
                        Err(e) => {
                            warn!(error = %e, "Accept failed");
                        }
                    }
                }
            }
        });

        Ok(Self {
            inner,
            addr,
            shutdown,
        })
    }

    /// The bound listen address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and close existing ones.
    pub fn shutdown(&self) {
        info!("Broker shutdown requested");
        self.shutdown.cancel();
    }

    /// Messages at rest on a queue. Ops/test introspection.
    #[must_use]
    pub fn queue_depth(&self, queue: &str) -> usize {
        self.inner.table.lock().depth(queue)
    }

    /// Messages in flight on a queue. Ops/test introspection.
    #[must_use]
    pub fn queue_in_flight(&self, queue: &str) -> usize {
        self.inner.table.lock().in_flight(queue)
    }
}

async fn handle_connection(inner: Arc<Inner>, stream: TcpStream, shutdown: CancellationToken) {
    let conn_id = inner.next_conn_id.fetch_add(1, Ordering::SeqCst);
    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let mut line = match serde_json::to_string(&frame) {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Failed to encode frame");
                    continue;
                }
            };
            line.push('\n');
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<ClientFrame>(&line) {
                        Ok(frame) => apply_frame(&inner, conn_id, &tx, frame),
                        Err(e) => {
                            // A client speaking a different protocol; drop the
                            // frame, keep the connection.
                            warn!(conn_id, error = %e, "Malformed frame dropped");
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(conn_id, error = %e, "Read error");
                    break;
                }
            }
        }
    }

    inner.table.lock().drop_connection(conn_id);
    writer.abort();
    debug!(conn_id, "Connection closed");
}

fn apply_frame(
    inner: &Arc<Inner>,
    conn_id: u64,
    tx: &mpsc::UnboundedSender<ServerFrame>,
    frame: ClientFrame,
) {
    let mut table = inner.table.lock();
    match frame {
        ClientFrame::Declare { queue } => table.declare(&queue),
        ClientFrame::Publish { queue, body } => table.publish(&queue, body),
        ClientFrame::Consume { queue } => table.subscribe(&queue, conn_id, tx.clone()),
        ClientFrame::Ack { queue, tag } => table.ack(&queue, conn_id, tag),
        ClientFrame::Nack {
            queue,
            tag,
            requeue,
        } => table.nack(&queue, conn_id, tag, requeue),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn connect(addr: SocketAddr) -> TcpStream {
        TcpStream::connect(addr).await.unwrap()
    }

    async fn send_frame(stream: &mut TcpStream, frame: &ClientFrame) {
        let mut line = serde_json::to_string(frame).unwrap();
        line.push('\n');
        stream.write_all(line.as_bytes()).await.unwrap();
    }

    fn test_config() -> BrokerConfig {
        BrokerConfig {
            listen: "127.0.0.1:0".to_string(),
            max_redeliveries: 3,
        }
    }

    #[tokio::test]
    async fn test_publish_then_consume_over_tcp() {
        let broker = Broker::bind(test_config()).await.unwrap();

        let mut producer = connect(broker.addr()).await;
        send_frame(
            &mut producer,
            &ClientFrame::Publish {
                queue: "q".to_string(),
                body: json!({"n": 1}),
            },
        )
        .await;

        let mut consumer = connect(broker.addr()).await;
        send_frame(
            &mut consumer,
            &ClientFrame::Consume {
                queue: "q".to_string(),
            },
        )
        .await;

        let (read_half, _write_half) = consumer.split();
        let mut lines = BufReader::new(read_half).lines();
        let line = tokio::time::timeout(std::time::Duration::from_secs(2), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame: ServerFrame = serde_json::from_str(&line).unwrap();
        let ServerFrame::Delivery { queue, body, .. } = frame;
        assert_eq!(queue, "q");
        assert_eq!(body, json!({"n": 1}));

        broker.shutdown();
    }

    #[tokio::test]
    async fn test_consumer_disconnect_requeues() {
        let broker = Broker::bind(test_config()).await.unwrap();

        let mut producer = connect(broker.addr()).await;
        send_frame(
            &mut producer,
            &ClientFrame::Publish {
                queue: "q".to_string(),
                body: json!("payload"),
            },
        )
        .await;

        // Consumer takes the message and drops without settling.
        {
            let mut consumer = connect(broker.addr()).await;
            send_frame(
                &mut consumer,
                &ClientFrame::Consume {
                    queue: "q".to_string(),
                },
            )
            .await;
            let (read_half, _w) = consumer.split();
            let mut lines = BufReader::new(read_half).lines();
            let _ = tokio::time::timeout(std::time::Duration::from_secs(2), lines.next_line())
                .await
                .unwrap();
        }

        // The broker notices the disconnect and requeues.
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                if broker.queue_depth("q") == 1 {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        broker.shutdown();
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_kill_connection() {
        let broker = Broker::bind(test_config()).await.unwrap();

        let mut client = connect(broker.addr()).await;
        client.write_all(b"this is not json\n").await.unwrap();
        send_frame(
            &mut client,
            &ClientFrame::Publish {
                queue: "q".to_string(),
                body: json!(42),
            },
        )
        .await;

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            loop {
                if broker.queue_depth("q") == 1 {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        broker.shutdown();
    }
}
