//! In-process broker implementing [`TopicTransport`].
//!
//! A [`MemoryBroker`] owns the topics; each [`MemoryTransport`] is one client
//! connection to it with its own client id and consumer group. Within a topic,
//! every consumer group receives each message once, delivered round-robin to
//! the group's live members.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dossier_core::TopicName;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::{Subscription, TopicTransport, TransportError};

// ---------------------------------------------------------------------------
// Broker state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Member {
    connection_id: u64,
    tx: mpsc::UnboundedSender<Bytes>,
}

#[derive(Debug, Default)]
struct ConsumerGroup {
    members: Vec<Member>,
    next: usize,
}

impl ConsumerGroup {
    /// Hands `payload` to the next live member, pruning closed ones.
    fn deliver(&mut self, payload: &Bytes) -> bool {
        self.members.retain(|m| !m.tx.is_closed());
        if self.members.is_empty() {
            return false;
        }
        let idx = self.next % self.members.len();
        self.next = self.next.wrapping_add(1);
        self.members[idx].tx.send(payload.clone()).is_ok()
    }
}

#[derive(Debug, Default)]
struct Topic {
    groups: HashMap<String, ConsumerGroup>,
}

/// Process-local message broker.
#[derive(Debug)]
pub struct MemoryBroker {
    topics: Mutex<HashMap<TopicName, Topic>>,
    allow_auto_topic_creation: bool,
    next_connection_id: AtomicU64,
}

impl MemoryBroker {
    /// Creates a broker. With `allow_auto_topic_creation` off, topics must be
    /// created explicitly before anyone publishes or subscribes.
    #[must_use]
    pub fn new(allow_auto_topic_creation: bool) -> Arc<Self> {
        Arc::new(Self {
            topics: Mutex::new(HashMap::new()),
            allow_auto_topic_creation,
            next_connection_id: AtomicU64::new(1),
        })
    }

    /// Opens a client connection to this broker.
    #[must_use]
    pub fn connect(
        self: &Arc<Self>,
        client_id: impl Into<String>,
        group_id: impl Into<String>,
    ) -> MemoryTransport {
        MemoryTransport {
            broker: Arc::clone(self),
            connection_id: self.next_connection_id.fetch_add(1, Ordering::Relaxed),
            client_id: client_id.into(),
            group_id: group_id.into(),
            connected: AtomicBool::new(true),
        }
    }

    /// Number of topics currently known to the broker.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.lock().len()
    }

    fn ensure_topic<'a>(
        &self,
        topics: &'a mut HashMap<TopicName, Topic>,
        topic: &TopicName,
    ) -> Result<&'a mut Topic, TransportError> {
        if !topics.contains_key(topic) {
            if !self.allow_auto_topic_creation {
                return Err(TransportError::UnknownTopic(topic.to_string()));
            }
            topics.insert(topic.clone(), Topic::default());
        }
        topics
            .get_mut(topic)
            .ok_or_else(|| TransportError::UnknownTopic(topic.to_string()))
    }

    fn drop_connection(&self, connection_id: u64) {
        let mut topics = self.topics.lock();
        for topic in topics.values_mut() {
            for group in topic.groups.values_mut() {
                group.members.retain(|m| m.connection_id != connection_id);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryTransport
// ---------------------------------------------------------------------------

/// One client connection to a [`MemoryBroker`].
#[derive(Debug)]
pub struct MemoryTransport {
    broker: Arc<MemoryBroker>,
    connection_id: u64,
    client_id: String,
    group_id: String,
    connected: AtomicBool,
}

impl MemoryTransport {
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    fn check_connected(&self) -> Result<(), TransportError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }
}

#[async_trait]
impl TopicTransport for MemoryTransport {
    async fn create_topic(&self, topic: &TopicName) -> Result<(), TransportError> {
        self.check_connected()?;
        self.broker
            .topics
            .lock()
            .entry(topic.clone())
            .or_default();
        Ok(())
    }

    async fn publish(&self, topic: &TopicName, payload: Bytes) -> Result<(), TransportError> {
        self.check_connected()?;
        let mut topics = self.broker.topics.lock();
        let entry = self.broker.ensure_topic(&mut topics, topic)?;
        let mut delivered = 0usize;
        for group in entry.groups.values_mut() {
            if group.deliver(&payload) {
                delivered += 1;
            }
        }
        if delivered == 0 {
            debug!(topic = %topic, client = %self.client_id, "published with no subscribers");
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &TopicName) -> Result<Subscription, TransportError> {
        self.check_connected()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut topics = self.broker.topics.lock();
        let entry = self.broker.ensure_topic(&mut topics, topic)?;
        entry
            .groups
            .entry(self.group_id.clone())
            .or_default()
            .members
            .push(Member {
                connection_id: self.connection_id,
                tx,
            });
        debug!(topic = %topic, group = %self.group_id, client = %self.client_id, "subscribed");
        Ok(Subscription::new(topic.clone(), rx))
    }

    async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::AcqRel) {
            self.broker.drop_connection(self.connection_id);
            debug!(client = %self.client_id, "transport disconnected");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
