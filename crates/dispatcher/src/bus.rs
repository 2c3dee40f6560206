//! MessageBus - in-process topic broadcast
//!
//! One `tokio::sync::broadcast` channel per topic plus a global tap that sees
//! every envelope (consumed by the dispatcher). Topic channels are shallow:
//! a lagging subscriber loses the oldest messages, never blocks publishers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use contracts::{BusConfig, BusMessage, Envelope};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default tap capacity when built without a config
const DEFAULT_TAP_CAPACITY: usize = 256;

struct TopicChannel {
    sender: broadcast::Sender<Envelope>,
    seq: Arc<AtomicU64>,
}

struct BusInner {
    queue_depth: usize,
    topics: Mutex<HashMap<String, TopicChannel>>,
    tap: broadcast::Sender<Envelope>,
}

/// Shared message bus. Clones share the same channels.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// Create a bus whose topic channels hold `queue_depth` messages
    pub fn new(queue_depth: usize, tap_capacity: usize) -> Self {
        let (tap, _) = broadcast::channel(tap_capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                queue_depth: queue_depth.max(1),
                topics: Mutex::new(HashMap::new()),
                tap,
            }),
        }
    }

    pub fn from_config(config: &BusConfig) -> Self {
        Self::new(config.queue_depth, config.tap_capacity)
    }

    /// Declare an output topic and get a publisher for it
    pub fn advertise(&self, topic: impl Into<String>) -> Publisher {
        let topic = topic.into();
        let (sender, seq) = self.channel(&topic);
        debug!(topic = %topic, "topic advertised");
        Publisher {
            topic,
            sender,
            seq,
            tap: self.inner.tap.clone(),
        }
    }

    /// Subscribe to one topic
    ///
    /// Only messages published after this call are received.
    pub fn subscribe(&self, topic: impl Into<String>) -> Subscription {
        let topic = topic.into();
        let (sender, _) = self.channel(&topic);
        Subscription {
            topic,
            receiver: sender.subscribe(),
        }
    }

    /// Receive every envelope published on any topic
    pub fn tap(&self) -> broadcast::Receiver<Envelope> {
        self.inner.tap.subscribe()
    }

    /// One-off publish without holding a `Publisher`
    pub fn publish(&self, topic: &str, message: BusMessage) -> u64 {
        self.advertise(topic).publish(message)
    }

    /// Topics seen so far (advertised or subscribed), sorted
    pub fn topics(&self) -> Vec<String> {
        let topics = self.inner.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = topics.keys().cloned().collect();
        names.sort();
        names
    }

    fn channel(&self, topic: &str) -> (broadcast::Sender<Envelope>, Arc<AtomicU64>) {
        let mut topics = self.inner.topics.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = topics.entry(topic.to_string()).or_insert_with(|| {
            let (sender, _) = broadcast::channel(self.inner.queue_depth);
            TopicChannel {
                sender,
                seq: Arc::new(AtomicU64::new(0)),
            }
        });
        (entry.sender.clone(), Arc::clone(&entry.seq))
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(1, DEFAULT_TAP_CAPACITY)
    }
}

/// Write end of one topic
#[derive(Clone)]
pub struct Publisher {
    topic: String,
    sender: broadcast::Sender<Envelope>,
    seq: Arc<AtomicU64>,
    tap: broadcast::Sender<Envelope>,
}

impl Publisher {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish a message, returning its per-topic sequence number
    ///
    /// Having no subscribers is not an error.
    pub fn publish(&self, message: BusMessage) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let envelope = Envelope {
            topic: self.topic.clone(),
            seq,
            message,
        };
        // send only fails when nobody is listening
        let _ = self.tap.send(envelope.clone());
        let _ = self.sender.send(envelope);
        seq
    }

    /// Current subscriber count on this topic (tap excluded)
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Read end of one topic
pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<Envelope>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next envelope
    ///
    /// Lagged messages are skipped with a warning. Returns `None` once the
    /// bus is gone.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{TwistMsg, Vector3};

    fn twist(x: f64) -> BusMessage {
        BusMessage::Twist(TwistMsg {
            linear: Vector3::new(x, 0.0, 0.0),
            angular: Vector3::default(),
        })
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = MessageBus::default();
        let publisher = bus.advertise("cmd_vel");
        assert_eq!(publisher.publish(twist(1.0)), 1);
        assert_eq!(publisher.publish(twist(2.0)), 2);
    }

    #[tokio::test]
    async fn test_subscriber_receives_topic_only() {
        let bus = MessageBus::new(4, 16);
        let mut sub = bus.subscribe("a");
        let a = bus.advertise("a");
        let b = bus.advertise("b");

        b.publish(twist(9.0));
        a.publish(twist(1.0));

        let envelope = sub.recv().await.unwrap();
        assert_eq!(envelope.topic, "a");
        assert_eq!(envelope.seq, 1);
    }

    #[tokio::test]
    async fn test_tap_sees_all_topics() {
        let bus = MessageBus::new(1, 16);
        let mut tap = bus.tap();
        bus.publish("a", twist(1.0));
        bus.publish("b", twist(2.0));

        assert_eq!(tap.recv().await.unwrap().topic, "a");
        assert_eq!(tap.recv().await.unwrap().topic, "b");
    }

    #[tokio::test]
    async fn test_shallow_queue_keeps_newest() {
        let bus = MessageBus::new(1, 16);
        let mut sub = bus.subscribe("cmd_vel");
        let publisher = bus.advertise("cmd_vel");
        publisher.publish(twist(1.0));
        publisher.publish(twist(2.0));
        publisher.publish(twist(3.0));

        let envelope = sub.recv().await.unwrap();
        assert_eq!(envelope.seq, 3);
    }

    #[tokio::test]
    async fn test_seq_shared_between_publishers() {
        let bus = MessageBus::default();
        let first = bus.advertise("tf");
        let second = bus.advertise("tf");
        first.publish(twist(0.0));
        assert_eq!(second.publish(twist(0.0)), 2);
        assert_eq!(bus.topics(), vec!["tf".to_string()]);
    }
}
