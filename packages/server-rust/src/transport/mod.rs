//! Topic-based publish/subscribe transport.
//!
//! The correlation layer only needs three things from a broker: publish a
//! payload on a topic, subscribe to a topic, and know when the connection is
//! gone. [`TopicTransport`] captures exactly that; [`memory`] provides the
//! in-process broker used by the `dossier` binary and the tests.

pub mod config;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use dossier_core::TopicName;
use tokio::sync::mpsc;

pub use config::TransportConfig;
pub use memory::{MemoryBroker, MemoryTransport};

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Broker-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport is disconnected")]
    Disconnected,
    #[error("topic '{0}' does not exist and auto topic creation is disabled")]
    UnknownTopic(String),
    #[error("unsupported broker address '{0}'")]
    UnsupportedBroker(String),
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// An acknowledged subscription to one topic.
///
/// Returned only after the broker has recorded the subscriber, so anything
/// published afterwards is delivered. Dropping the subscription unsubscribes.
/// `recv()` yields `None` once the transport disconnects.
#[derive(Debug)]
pub struct Subscription {
    topic: TopicName,
    rx: mpsc::UnboundedReceiver<Bytes>,
}

impl Subscription {
    #[must_use]
    pub fn new(topic: TopicName, rx: mpsc::UnboundedReceiver<Bytes>) -> Self {
        Self { topic, rx }
    }

    #[must_use]
    pub fn topic(&self) -> &TopicName {
        &self.topic
    }

    /// Waits for the next delivered payload.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

// ---------------------------------------------------------------------------
// TopicTransport trait
// ---------------------------------------------------------------------------

/// Pluggable publish/subscribe broker connection.
///
/// Delivery is at-least-once with no ordering across topics. Subscribers that
/// share a consumer group compete for messages; distinct groups each receive
/// every message.
#[async_trait]
pub trait TopicTransport: Send + Sync + 'static {
    /// Creates `topic` on the broker if it does not exist yet.
    async fn create_topic(&self, topic: &TopicName) -> Result<(), TransportError>;

    /// Publishes one payload on `topic`. Publishing to a topic nobody
    /// subscribes to succeeds and the payload is dropped.
    async fn publish(&self, topic: &TopicName, payload: Bytes) -> Result<(), TransportError>;

    /// Subscribes to `topic` within this connection's consumer group.
    async fn subscribe(&self, topic: &TopicName) -> Result<Subscription, TransportError>;

    /// Closes the connection. Open subscriptions end and every later call
    /// fails with `TransportError::Disconnected`.
    async fn disconnect(&self);

    fn is_connected(&self) -> bool;
}
