//! Queue state machine.
//!
//! All broker semantics live here, independent of the TCP layer:
//! FIFO queues, round-robin delivery to competing consumers with one
//! message in flight per consumer, the delivered -> acked | nacked tag
//! lifecycle, and bounded redelivery into dead-letter queues.

use std::collections::{HashMap, VecDeque};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::ServerFrame;
use flow_telemetry::Metrics;

/// A message at rest in a queue.
#[derive(Debug)]
struct StoredMessage {
    body: Value,
    /// Times this message has been returned to the queue, via
    /// nack-with-requeue or consumer disconnect.
    redeliveries: u32,
}

struct Consumer {
    conn_id: u64,
    tx: mpsc::UnboundedSender<ServerFrame>,
    /// Prefetch is fixed at one: a busy consumer gets nothing more
    /// until it settles its in-flight delivery.
    busy: bool,
}

struct Unacked {
    conn_id: u64,
    msg: StoredMessage,
}

#[derive(Default)]
struct Queue {
    ready: VecDeque<StoredMessage>,
    consumers: Vec<Consumer>,
    /// Round-robin cursor over consumers.
    rr: usize,
    unacked: HashMap<u64, Unacked>,
    next_tag: u64,
}

enum Settled {
    Requeue(StoredMessage),
    Dead(StoredMessage),
}

/// All queues of a broker instance.
pub struct QueueTable {
    queues: HashMap<String, Queue>,
    max_redeliveries: u32,
}

impl QueueTable {
    #[must_use]
    pub fn new(max_redeliveries: u32) -> Self {
        Self {
            queues: HashMap::new(),
            max_redeliveries,
        }
    }

    /// Ensure a queue exists. Idempotent.
    pub fn declare(&mut self, name: &str) {
        if !self.queues.contains_key(name) {
            debug!(queue = name, "Queue declared");
            self.queues.insert(name.to_string(), Queue::default());
        }
    }

    /// Append a message and deliver it if a consumer is idle.
    pub fn publish(&mut self, name: &str, body: Value) {
        self.declare(name);
        if let Some(q) = self.queues.get_mut(name) {
            q.ready.push_back(StoredMessage {
                body,
                redeliveries: 0,
            });
        }
        self.pump(name);
    }

    /// Register a connection as a consumer of a queue.
    ///
    /// Idempotent per connection: a client re-registering after a
    /// reconnect replay does not gain a second in-flight slot.
    pub fn subscribe(&mut self, name: &str, conn_id: u64, tx: mpsc::UnboundedSender<ServerFrame>) {
        self.declare(name);
        if let Some(q) = self.queues.get_mut(name) {
            if q.consumers.iter().any(|c| c.conn_id == conn_id) {
                return;
            }
            q.consumers.push(Consumer {
                conn_id,
                tx,
                busy: false,
            });
            debug!(queue = name, conn_id, consumers = q.consumers.len(), "Consumer registered");
        }
        self.pump(name);
    }

    /// Settle a delivery: the message is permanently removed.
    ///
    /// Tags from a previous connection (already requeued on disconnect)
    /// are ignored.
    pub fn ack(&mut self, name: &str, conn_id: u64, tag: u64) {
        let Some(q) = self.queues.get_mut(name) else {
            return;
        };
        match q.unacked.get(&tag) {
            Some(u) if u.conn_id == conn_id => {}
            _ => return,
        }
        q.unacked.remove(&tag);
        mark_idle(q, conn_id);
        self.pump(name);
    }

    /// Settle a delivery negatively.
    ///
    /// Requeued messages go back to the front of the queue and count
    /// against the redelivery budget; over budget or `requeue = false`
    /// moves the message to `<queue>.dead`.
    pub fn nack(&mut self, name: &str, conn_id: u64, tag: u64, requeue: bool) {
        let max_redeliveries = self.max_redeliveries;
        let settled = {
            let Some(q) = self.queues.get_mut(name) else {
                return;
            };
            let matches = matches!(q.unacked.get(&tag), Some(u) if u.conn_id == conn_id);
            if !matches {
                return;
            }
            let Some(Unacked { mut msg, .. }) = q.unacked.remove(&tag) else {
                return;
            };
            mark_idle(q, conn_id);
            if requeue {
                msg.redeliveries += 1;
                if msg.redeliveries > max_redeliveries {
                    Settled::Dead(msg)
                } else {
                    Settled::Requeue(msg)
                }
            } else {
                Settled::Dead(msg)
            }
        };
        match settled {
            Settled::Requeue(msg) => {
                if let Some(q) = self.queues.get_mut(name) {
                    // front of the queue: a retried message keeps its place
                    q.ready.push_front(msg);
                }
            }
            Settled::Dead(msg) => self.dead_letter(name, msg),
        }
        self.pump(name);
    }

    /// Remove a connection's consumers and requeue its in-flight
    /// messages, counting each against the redelivery budget.
    pub fn drop_connection(&mut self, conn_id: u64) {
        let max_redeliveries = self.max_redeliveries;
        let names: Vec<String> = self.queues.keys().cloned().collect();
        for name in names {
            let mut dead = Vec::new();
            {
                let Some(q) = self.queues.get_mut(&name) else {
                    continue;
                };
                q.consumers.retain(|c| c.conn_id != conn_id);
                let mut tags: Vec<u64> = q
                    .unacked
                    .iter()
                    .filter(|(_, u)| u.conn_id == conn_id)
                    .map(|(tag, _)| *tag)
                    .collect();
                // Requeue newest-first so push_front restores delivery order.
                tags.sort_unstable();
                for tag in tags.into_iter().rev() {
                    if let Some(Unacked { mut msg, .. }) = q.unacked.remove(&tag) {
                        msg.redeliveries += 1;
                        if msg.redeliveries > max_redeliveries {
                            dead.push(msg);
                        } else {
                            q.ready.push_front(msg);
                        }
                    }
                }
            }
            for msg in dead {
                self.dead_letter(&name, msg);
            }
            self.pump(&name);
        }
    }

    /// Number of messages at rest in a queue.
    #[must_use]
    pub fn depth(&self, name: &str) -> usize {
        self.queues.get(name).map_or(0, |q| q.ready.len())
    }

    /// Number of messages in flight on a queue.
    #[must_use]
    pub fn in_flight(&self, name: &str) -> usize {
        self.queues.get(name).map_or(0, |q| q.unacked.len())
    }

    fn dead_letter(&mut self, origin: &str, msg: StoredMessage) {
        warn!(
            queue = origin,
            redeliveries = msg.redeliveries,
            "Message moved to dead-letter queue"
        );
        Metrics::dead_lettered(origin);
        let dead = flow_core::queues::dead_letter(origin);
        self.declare(&dead);
        if let Some(q) = self.queues.get_mut(&dead) {
            q.ready.push_back(StoredMessage {
                body: msg.body,
                redeliveries: 0,
            });
        }
        self.pump(&dead);
    }

    /// Deliver ready messages to idle consumers, round robin.
    fn pump(&mut self, name: &str) {
        let Some(q) = self.queues.get_mut(name) else {
            return;
        };
        while !q.ready.is_empty() {
            let mut picked = None;
            let mut scanned = 0;
            while scanned < q.consumers.len() {
                let idx = q.rr % q.consumers.len();
                q.rr = q.rr.wrapping_add(1);
                scanned += 1;
                if !q.consumers[idx].busy {
                    picked = Some(idx);
                    break;
                }
            }
            let Some(idx) = picked else {
                break;
            };
            let Some(msg) = q.ready.pop_front() else {
                break;
            };
            let tag = q.next_tag;
            q.next_tag += 1;
            let frame = ServerFrame::Delivery {
                queue: name.to_string(),
                tag,
                redelivered: msg.redeliveries > 0,
                body: msg.body.clone(),
            };
            if q.consumers[idx].tx.send(frame).is_err() {
                // Consumer channel gone: evict it and keep the message.
                q.consumers.remove(idx);
                q.ready.push_front(msg);
                continue;
            }
            let conn_id = q.consumers[idx].conn_id;
            q.consumers[idx].busy = true;
            q.unacked.insert(tag, Unacked { conn_id, msg });
        }
    }
}

fn mark_idle(q: &mut Queue, conn_id: u64) {
    if let Some(c) = q.consumers.iter_mut().find(|c| c.conn_id == conn_id) {
        c.busy = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn consumer_channel() -> (
        mpsc::UnboundedSender<ServerFrame>,
        mpsc::UnboundedReceiver<ServerFrame>,
    ) {
        mpsc::unbounded_channel()
    }

    fn recv_delivery(rx: &mut mpsc::UnboundedReceiver<ServerFrame>) -> (u64, bool, Value) {
        match rx.try_recv().expect("expected a delivery") {
            ServerFrame::Delivery {
                tag,
                redelivered,
                body,
                ..
            } => (tag, redelivered, body),
        }
    }

    #[test]
    fn test_fifo_delivery_order() {
        let mut table = QueueTable::new(3);
        let (tx, mut rx) = consumer_channel();
        table.subscribe("q", 1, tx);

        table.publish("q", json!(1));
        let (tag, _, body) = recv_delivery(&mut rx);
        assert_eq!(body, json!(1));
        table.ack("q", 1, tag);

        table.publish("q", json!(2));
        table.publish("q", json!(3));
        let (tag, _, body) = recv_delivery(&mut rx);
        assert_eq!(body, json!(2));
        table.ack("q", 1, tag);
        let (_, _, body) = recv_delivery(&mut rx);
        assert_eq!(body, json!(3));
    }

    #[test]
    fn test_prefetch_one_until_ack() {
        let mut table = QueueTable::new(3);
        let (tx, mut rx) = consumer_channel();
        table.subscribe("q", 1, tx);

        table.publish("q", json!(1));
        table.publish("q", json!(2));

        let (tag, _, _) = recv_delivery(&mut rx);
        // Second message must wait for the ack.
        assert!(rx.try_recv().is_err());
        assert_eq!(table.depth("q"), 1);

        table.ack("q", 1, tag);
        let (_, _, body) = recv_delivery(&mut rx);
        assert_eq!(body, json!(2));
    }

    #[test]
    fn test_competing_consumers_round_robin() {
        let mut table = QueueTable::new(3);
        let (tx_a, mut rx_a) = consumer_channel();
        let (tx_b, mut rx_b) = consumer_channel();
        table.subscribe("q", 1, tx_a);
        table.subscribe("q", 2, tx_b);

        table.publish("q", json!("first"));
        table.publish("q", json!("second"));

        // Each message goes to exactly one consumer.
        let (_, _, body_a) = recv_delivery(&mut rx_a);
        let (_, _, body_b) = recv_delivery(&mut rx_b);
        assert_ne!(body_a, body_b);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_nack_requeue_sets_redelivered() {
        let mut table = QueueTable::new(3);
        let (tx, mut rx) = consumer_channel();
        table.subscribe("q", 1, tx);

        table.publish("q", json!("retry-me"));
        let (tag, redelivered, _) = recv_delivery(&mut rx);
        assert!(!redelivered);

        table.nack("q", 1, tag, true);
        let (_, redelivered, body) = recv_delivery(&mut rx);
        assert!(redelivered);
        assert_eq!(body, json!("retry-me"));
    }

    #[test]
    fn test_redelivery_budget_then_dead_letter() {
        let mut table = QueueTable::new(2);
        let (tx, mut rx) = consumer_channel();
        table.subscribe("q", 1, tx);
        table.publish("q", json!("poison"));

        // First delivery plus two redeliveries, then dead-lettered.
        let mut deliveries = 0;
        while let Ok(ServerFrame::Delivery { tag, .. }) = rx.try_recv() {
            deliveries += 1;
            table.nack("q", 1, tag, true);
        }
        assert_eq!(deliveries, 3);
        assert_eq!(table.depth("q"), 0);
        assert_eq!(table.depth("q.dead"), 1);
    }

    #[test]
    fn test_nack_without_requeue_dead_letters_immediately() {
        let mut table = QueueTable::new(3);
        let (tx, mut rx) = consumer_channel();
        table.subscribe("q", 1, tx);
        table.publish("q", json!("bad-shape"));

        let (tag, _, _) = recv_delivery(&mut rx);
        table.nack("q", 1, tag, false);

        assert!(rx.try_recv().is_err());
        assert_eq!(table.depth("q.dead"), 1);
    }

    #[test]
    fn test_disconnect_requeues_in_flight() {
        let mut table = QueueTable::new(3);
        let (tx, mut rx) = consumer_channel();
        table.subscribe("q", 1, tx);
        table.publish("q", json!("in-flight"));
        let (_, redelivered, _) = recv_delivery(&mut rx);
        assert!(!redelivered);

        // Consumer dies without settling.
        table.drop_connection(1);
        assert_eq!(table.depth("q"), 1);
        assert_eq!(table.in_flight("q"), 0);

        // A new consumer sees the message flagged as redelivered.
        let (tx2, mut rx2) = consumer_channel();
        table.subscribe("q", 2, tx2);
        let (_, redelivered, body) = recv_delivery(&mut rx2);
        assert!(redelivered);
        assert_eq!(body, json!("in-flight"));
    }

    #[test]
    fn test_stale_ack_from_previous_connection_ignored() {
        let mut table = QueueTable::new(3);
        let (tx, mut rx) = consumer_channel();
        table.subscribe("q", 1, tx);
        table.publish("q", json!("x"));
        let (tag, _, _) = recv_delivery(&mut rx);

        table.drop_connection(1);
        // The old tag no longer refers to anything.
        table.ack("q", 1, tag);
        assert_eq!(table.depth("q"), 1);
    }

    #[test]
    fn test_declare_is_idempotent() {
        let mut table = QueueTable::new(3);
        table.declare("q");
        table.publish("q", json!(1));
        table.declare("q");
        assert_eq!(table.depth("q"), 1);
    }
}
