//! Correlation client: request/response on top of publish/subscribe.
//!
//! `request()` follows a fixed sequence:
//!
//! 1. make sure a listener is subscribed to the topic's reply topic
//! 2. insert a pending entry keyed by a fresh correlation id
//! 3. publish the request envelope
//! 4. await the matching reply under a single timer
//!
//! Steps 1 and 2 happen before the publish, so a fast reply can never arrive
//! ahead of its waiter. The pending entry is released by an RAII guard on
//! every exit path. There are no retries; the caller decides.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dossier_core::{CorrelationError, Envelope, TopicName, TopicRegistry};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::CorrelationConfig;
use super::pending::{Completion, PendingTable};
use crate::transport::{Subscription, TopicTransport, TransportError};

type Listeners = Arc<Mutex<HashMap<TopicName, JoinHandle<()>>>>;

/// Issues correlated requests and routes replies back to their callers.
pub struct CorrelationClient {
    transport: Arc<dyn TopicTransport>,
    registry: Arc<TopicRegistry>,
    pending: Arc<PendingTable>,
    listeners: Listeners,
    subscribe_lock: tokio::sync::Mutex<()>,
    closed: AtomicBool,
    config: CorrelationConfig,
}

impl CorrelationClient {
    /// Connects the client and subscribes to every reply topic in `registry`.
    ///
    /// Returns once all reply subscriptions are acknowledged.
    ///
    /// # Errors
    ///
    /// Returns `CorrelationError::TransportFailure` if a subscription fails.
    pub async fn connect(
        transport: Arc<dyn TopicTransport>,
        registry: Arc<TopicRegistry>,
        config: CorrelationConfig,
    ) -> Result<Arc<Self>, CorrelationError> {
        let client = Arc::new(Self {
            transport,
            registry,
            pending: PendingTable::new(),
            listeners: Arc::new(Mutex::new(HashMap::new())),
            subscribe_lock: tokio::sync::Mutex::new(()),
            closed: AtomicBool::new(false),
            config,
        });

        let reply_topics: Vec<TopicName> = client.registry.reply_topics().cloned().collect();
        for reply_topic in &reply_topics {
            client.ensure_listener(reply_topic).await?;
        }
        info!(
            reply_topics = reply_topics.len(),
            default_timeout_ms = client.config.default_timeout_ms(),
            "correlation client connected"
        );
        Ok(client)
    }

    /// Sends `payload` on `topic` and waits for the matching reply.
    ///
    /// `timeout` falls back to the configured default when `None`.
    ///
    /// # Errors
    ///
    /// - `CorrelationError::Timeout` if no reply arrives in time
    /// - `CorrelationError::TransportFailure` if the client is closed, the
    ///   broker refuses the publish, or the reply subscription ends
    /// - `CorrelationError::Handler` if the handler answered with an error
    pub async fn request(
        &self,
        topic: &TopicName,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Envelope, CorrelationError> {
        let timeout = timeout.unwrap_or(self.config.default_timeout);
        let reply_topic = self.registry.reply_for(topic);
        self.ensure_listener(&reply_topic).await?;

        let envelope = Envelope::request(
            topic.clone(),
            reply_topic.clone(),
            payload,
            millis(timeout),
        );
        let correlation_id = envelope.correlation_id;
        let bytes = envelope
            .encode()
            .map_err(|e| CorrelationError::TransportFailure { cause: e.to_string() })?;

        let (guard, rx) = self
            .pending
            .insert(correlation_id, topic.clone(), reply_topic, timeout);
        let issued_at = Instant::now();

        debug!(topic = %topic, %correlation_id, timeout_ms = millis(timeout), "publishing request");
        self.transport
            .publish(topic, Bytes::from(bytes))
            .await
            .map_err(transport_failure)?;

        let outcome = tokio::time::timeout(timeout, rx).await;
        drop(guard);

        match outcome {
            Ok(Ok(reply)) => {
                debug!(
                    topic = %topic,
                    %correlation_id,
                    elapsed_ms = millis(issued_at.elapsed()),
                    error = reply.is_error(),
                    "reply received"
                );
                into_result(reply)
            }
            Ok(Err(_closed)) => Err(CorrelationError::TransportFailure {
                cause: format!("reply subscription for '{topic}' closed"),
            }),
            Err(_elapsed) => {
                let elapsed_ms = millis(issued_at.elapsed());
                debug!(topic = %topic, %correlation_id, elapsed_ms, "request timed out");
                Err(CorrelationError::Timeout {
                    topic: topic.to_string(),
                    elapsed_ms,
                })
            }
        }
    }

    /// Typed wrapper around [`request`](Self::request).
    ///
    /// # Errors
    ///
    /// Everything `request` returns, plus `CorrelationError::Decode` when the
    /// payload cannot be serialized or the reply body does not match `R`.
    pub async fn request_json<T, R>(
        &self,
        topic: &TopicName,
        payload: &T,
        timeout: Option<Duration>,
    ) -> Result<R, CorrelationError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let value = serde_json::to_value(payload)
            .map_err(|e| CorrelationError::Decode { cause: e.to_string() })?;
        let reply = self.request(topic, value, timeout).await?;
        serde_json::from_value(reply.body)
            .map_err(|e| CorrelationError::Decode { cause: e.to_string() })
    }

    /// Number of requests currently awaiting a reply.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Reply topics with a live listener.
    #[must_use]
    pub fn listening_on(&self) -> Vec<TopicName> {
        let mut topics: Vec<_> = self.listeners.lock().keys().cloned().collect();
        topics.sort();
        topics
    }

    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.config.default_timeout
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops every reply listener and fails all pending requests. Later
    /// requests fail with `TransportFailure`.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let handles: Vec<_> = self.listeners.lock().drain().map(|(_, h)| h).collect();
        for handle in handles {
            handle.abort();
        }
        self.pending.abandon_all();
        info!("correlation client closed");
    }

    async fn ensure_listener(&self, reply_topic: &TopicName) -> Result<(), CorrelationError> {
        self.check_open()?;
        if self.listeners.lock().contains_key(reply_topic) {
            return Ok(());
        }
        let _serialized = self.subscribe_lock.lock().await;
        self.check_open()?;
        if self.listeners.lock().contains_key(reply_topic) {
            return Ok(());
        }

        let subscription = self
            .transport
            .subscribe(reply_topic)
            .await
            .map_err(transport_failure)?;
        let handle = tokio::spawn(listen(
            subscription,
            Arc::clone(&self.pending),
            Arc::clone(&self.listeners),
        ));
        {
            let mut listeners = self.listeners.lock();
            if self.is_closed() {
                handle.abort();
                return Err(closed_failure());
            }
            listeners.insert(reply_topic.clone(), handle);
        }
        debug!(reply_topic = %reply_topic, "reply listener armed");
        Ok(())
    }

    fn check_open(&self) -> Result<(), CorrelationError> {
        if self.is_closed() {
            Err(closed_failure())
        } else {
            Ok(())
        }
    }
}

impl Drop for CorrelationClient {
    fn drop(&mut self) {
        for (_, handle) in self.listeners.lock().drain() {
            handle.abort();
        }
    }
}

/// Routes replies from one reply topic to their pending requests.
async fn listen(mut subscription: Subscription, pending: Arc<PendingTable>, listeners: Listeners) {
    while let Some(bytes) = subscription.recv().await {
        let reply = match Envelope::decode(&bytes) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(reply_topic = %subscription.topic(), error = %e, "dropping undecodable reply");
                continue;
            }
        };
        let correlation_id = reply.correlation_id;
        if pending.complete(reply) == Completion::Stale {
            debug!(
                reply_topic = %subscription.topic(),
                %correlation_id,
                "discarding late reply"
            );
        }
    }

    let reply_topic = subscription.topic().clone();
    listeners.lock().remove(&reply_topic);
    let abandoned = pending.abandon_reply_topic(&reply_topic);
    warn!(reply_topic = %reply_topic, abandoned, "reply subscription ended");
}

fn into_result(reply: Envelope) -> Result<Envelope, CorrelationError> {
    match reply.error {
        Some(err) => Err(CorrelationError::Handler {
            status_code: err.status_code,
            message: err.message,
        }),
        None => Ok(reply),
    }
}

fn closed_failure() -> CorrelationError {
    CorrelationError::TransportFailure {
        cause: "correlation client is closed".to_string(),
    }
}

fn transport_failure(err: TransportError) -> CorrelationError {
    CorrelationError::TransportFailure {
        cause: err.to_string(),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transport::MemoryBroker;

    fn topic(name: &str) -> TopicName {
        TopicName::parse(name).unwrap()
    }

    /// Answers every request on `t` by echoing its body, after `delay`.
    async fn spawn_echo(broker: &Arc<MemoryBroker>, t: &TopicName, delay: Duration) {
        let worker = broker.connect("echo-worker", "workers");
        let mut sub = worker.subscribe(t).await.unwrap();
        tokio::spawn(async move {
            while let Some(bytes) = sub.recv().await {
                let req = Envelope::decode(&bytes).unwrap();
                tokio::time::sleep(delay).await;
                let reply_topic = req.reply_to.clone().unwrap();
                let reply = req.reply(reply_topic.clone(), req.body.clone());
                worker
                    .publish(&reply_topic, Bytes::from(reply.encode().unwrap()))
                    .await
                    .unwrap();
            }
        });
    }

    async fn client_for(broker: &Arc<MemoryBroker>, registry: TopicRegistry) -> Arc<CorrelationClient> {
        let transport: Arc<dyn TopicTransport> = Arc::new(broker.connect("gw", "gw-client"));
        CorrelationClient::connect(transport, Arc::new(registry), CorrelationConfig::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn connect_subscribes_registered_reply_topics() {
        let broker = MemoryBroker::new(true);
        let mut registry = TopicRegistry::new();
        registry.register(topic("documents.create")).unwrap();
        registry.register(topic("documents.find-all")).unwrap();

        let client = client_for(&broker, registry).await;
        let listening: Vec<String> = client.listening_on().iter().map(ToString::to_string).collect();
        assert_eq!(
            listening,
            vec!["documents.create.reply", "documents.find-all.reply"]
        );
    }

    #[tokio::test]
    async fn echo_resolves_with_handler_result() {
        let broker = MemoryBroker::new(true);
        let t = topic("echo.test");
        spawn_echo(&broker, &t, Duration::ZERO).await;
        let client = client_for(&broker, TopicRegistry::new()).await;

        let reply = client
            .request(&t, json!({"v": 1}), Some(Duration::from_millis(500)))
            .await
            .unwrap();
        assert_eq!(reply.body, json!({"v": 1}));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_topic_times_out_no_earlier_than_deadline() {
        let broker = MemoryBroker::new(true);
        let client = client_for(&broker, TopicRegistry::new()).await;

        let started = Instant::now();
        let err = client
            .request(&topic("missing.topic"), json!({}), Some(Duration::from_millis(200)))
            .await
            .unwrap_err();

        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(matches!(
            err,
            CorrelationError::Timeout { ref topic, elapsed_ms } if topic == "missing.topic" && elapsed_ms >= 200
        ));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn default_timeout_applies_when_unset() {
        let broker = MemoryBroker::new(true);
        let client = client_for(&broker, TopicRegistry::new()).await;
        assert_eq!(client.default_timeout(), Duration::from_millis(3000));

        let started = Instant::now();
        let err = client
            .request(&topic("silent.topic"), json!(null), None)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn late_reply_is_discarded() {
        let broker = MemoryBroker::new(true);
        let t = topic("slow.echo");
        spawn_echo(&broker, &t, Duration::from_millis(300)).await;
        let client = client_for(&broker, TopicRegistry::new()).await;

        let err = client
            .request(&t, json!({"v": "late"}), Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        // Let the delayed reply arrive; it must not resurrect anything.
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(client.pending_count(), 0);

        let reply = client
            .request(&t, json!({"v": "fresh"}), Some(Duration::from_millis(1000)))
            .await
            .unwrap();
        assert_eq!(reply.body, json!({"v": "fresh"}));
    }

    #[tokio::test]
    async fn publish_failure_is_transport_failure() {
        let broker = MemoryBroker::new(true);
        let conn = Arc::new(broker.connect("gw", "gw-client"));
        let transport: Arc<dyn TopicTransport> = conn.clone();
        let client = CorrelationClient::connect(
            transport,
            Arc::new(TopicRegistry::new()),
            CorrelationConfig::default(),
        )
        .await
        .unwrap();

        conn.disconnect().await;

        let err = client
            .request(&topic("echo.test"), json!({}), Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, CorrelationError::TransportFailure { .. }));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn auto_creation_disabled_surfaces_transport_failure() {
        let broker = MemoryBroker::new(false);
        let client = client_for(&broker, TopicRegistry::new()).await;
        let err = client
            .request(&topic("never.created"), json!({}), Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, CorrelationError::TransportFailure { .. }));
    }

    #[tokio::test]
    async fn cancelled_caller_releases_pending_entry() {
        let broker = MemoryBroker::new(true);
        let client = client_for(&broker, TopicRegistry::new()).await;
        let t = topic("echo.never");

        let task = {
            let client = Arc::clone(&client);
            let t = t.clone();
            tokio::spawn(async move {
                client.request(&t, json!({}), Some(Duration::from_secs(60))).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(client.pending_count(), 1);

        task.abort();
        let _ = task.await;
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn request_json_decodes_typed_reply() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Echo {
            v: u32,
        }

        let broker = MemoryBroker::new(true);
        let t = topic("echo.typed");
        spawn_echo(&broker, &t, Duration::ZERO).await;
        let client = client_for(&broker, TopicRegistry::new()).await;

        let echo: Echo = client
            .request_json(&t, &json!({"v": 7}), Some(Duration::from_millis(500)))
            .await
            .unwrap();
        assert_eq!(echo, Echo { v: 7 });

        let err = client
            .request_json::<_, Echo>(&t, &json!({"v": "seven"}), Some(Duration::from_millis(500)))
            .await
            .unwrap_err();
        assert!(matches!(err, CorrelationError::Decode { .. }));
    }

    #[tokio::test]
    async fn close_fails_pending_requests() {
        let broker = MemoryBroker::new(true);
        let client = client_for(&broker, TopicRegistry::new()).await;
        let t = topic("echo.never");

        let task = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client.request(&t, json!({}), Some(Duration::from_secs(60))).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        client.close();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, CorrelationError::TransportFailure { .. }));
        assert!(client.listening_on().is_empty());
    }

    #[tokio::test]
    async fn closed_client_refuses_new_requests() {
        let broker = MemoryBroker::new(true);
        let t = topic("echo.test");
        spawn_echo(&broker, &t, Duration::ZERO).await;
        let client = client_for(&broker, TopicRegistry::new()).await;
        client.request(&t, json!(1), None).await.unwrap();

        client.close();
        assert!(client.is_closed());

        let err = client.request(&t, json!(2), None).await.unwrap_err();
        assert_eq!(
            err,
            CorrelationError::TransportFailure {
                cause: "correlation client is closed".to_string(),
            }
        );
        assert!(client.listening_on().is_empty());
        assert_eq!(client.pending_count(), 0);
    }
}
