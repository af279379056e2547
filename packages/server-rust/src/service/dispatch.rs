//! Dispatch router: the worker side of the correlation layer.
//!
//! Handlers are bound to topics while the router is `Unbound`/`Binding`.
//! `start()` subscribes every bound topic, waits for the broker to
//! acknowledge each subscription, and only then reports `Ready`. Every
//! request that arrives runs through the handler pipeline and its outcome is
//! published on the request's reply topic with the request's correlation id.
//!
//! State machine: `Unbound -> Binding -> Ready -> Draining -> Closed`

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dossier_core::{Envelope, EnvelopeKind, HandlerError, TopicError, TopicName, TopicRegistry};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::{Service, ServiceExt};
use tracing::{debug, info, warn};

use super::config::DispatchConfig;
use super::handler::{HandlerFuture, HandlerRequest, TopicHandler};
use super::middleware::build_handler_pipeline;
use super::router::TopicRouter;
use crate::network::ShutdownController;
use crate::transport::{Subscription, TopicTransport, TransportError};

// ---------------------------------------------------------------------------
// DispatchState / DispatchError
// ---------------------------------------------------------------------------

/// Lifecycle of a [`DispatchRouter`]. Ordered: later states compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DispatchState {
    /// Nothing bound yet.
    Unbound,
    /// At least one handler bound, not yet serving.
    Binding,
    /// Every bound topic is subscribed and being served.
    Ready,
    /// No new messages are taken; in-flight handlers are finishing.
    Draining,
    /// Subscriptions dropped, router finished.
    Closed,
}

impl DispatchState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unbound => "unbound",
            Self::Binding => "binding",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("topic '{0}' is already bound")]
    AlreadyBound(String),
    #[error("router is {state}; bindings are sealed")]
    Sealed { state: DispatchState },
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

// ---------------------------------------------------------------------------
// DispatchRouter
// ---------------------------------------------------------------------------

/// Binds topics to handlers and serves them over a [`TopicTransport`].
pub struct DispatchRouter {
    transport: Arc<dyn TopicTransport>,
    config: DispatchConfig,
    state: watch::Sender<DispatchState>,
    sealed: AtomicBool,
    handlers: Mutex<HashMap<TopicName, Arc<dyn TopicHandler>>>,
    registry: Mutex<TopicRegistry>,
    lifecycle: Arc<ShutdownController>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl DispatchRouter {
    #[must_use]
    pub fn new(transport: Arc<dyn TopicTransport>, config: DispatchConfig) -> Arc<Self> {
        let (state, _rx) = watch::channel(DispatchState::Unbound);
        Arc::new(Self {
            transport,
            config,
            state,
            sealed: AtomicBool::new(false),
            handlers: Mutex::new(HashMap::new()),
            registry: Mutex::new(TopicRegistry::new()),
            lifecycle: Arc::new(ShutdownController::new()),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Binds `handler` to `topic`.
    ///
    /// # Errors
    ///
    /// - `DispatchError::AlreadyBound` if `topic` already has a handler
    /// - `DispatchError::Sealed` once `start()` has been called
    /// - `DispatchError::Topic` if `topic` is itself a reply topic
    pub fn bind(&self, topic: TopicName, handler: impl TopicHandler) -> Result<(), DispatchError> {
        let mut handlers = self.handlers.lock();
        if self.sealed.load(Ordering::Acquire) {
            return Err(DispatchError::Sealed {
                state: self.state(),
            });
        }
        self.transition(&[DispatchState::Unbound, DispatchState::Binding], DispatchState::Binding)?;
        self.registry
            .lock()
            .register(topic.clone())
            .map_err(|e| match e {
                TopicError::Duplicate(name) => DispatchError::AlreadyBound(name),
                other => DispatchError::Topic(other),
            })?;
        handlers.insert(topic.clone(), Arc::new(handler));
        debug!(topic = %topic, "handler bound");
        Ok(())
    }

    /// Creates every bound topic and its reply topic on the broker,
    /// subscribes the bound topics, and starts serving.
    ///
    /// Returns once all subscriptions are acknowledged; the state is then
    /// `Ready`.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Sealed` if called twice, or
    /// `DispatchError::Transport` if a subscription fails. In the latter case
    /// the router stays in `Binding` and may be started again.
    pub async fn start(&self) -> Result<(), DispatchError> {
        let (handlers, registry) = {
            let handlers = self.handlers.lock();
            let state = self.state();
            if state > DispatchState::Binding || self.sealed.swap(true, Ordering::AcqRel) {
                return Err(DispatchError::Sealed { state });
            }
            (handlers.clone(), Arc::new(self.registry.lock().clone()))
        };

        let mut subscriptions = Vec::with_capacity(registry.len());
        for topic in registry.topics() {
            let created = match self.transport.create_topic(topic).await {
                Ok(()) => self.transport.create_topic(&registry.reply_for(topic)).await,
                Err(e) => Err(e),
            };
            let subscribed = match created {
                Ok(()) => self.transport.subscribe(topic).await,
                Err(e) => Err(e),
            };
            match subscribed {
                Ok(sub) => subscriptions.push(sub),
                Err(e) => {
                    self.sealed.store(false, Ordering::Release);
                    warn!(topic = %topic, error = %e, "subscription failed, router not started");
                    return Err(e.into());
                }
            }
        }

        let pipeline = build_handler_pipeline(TopicRouter::new(handlers), &self.config);
        {
            let mut listeners = self.listeners.lock();
            for subscription in subscriptions {
                listeners.push(tokio::spawn(serve_topic(
                    subscription,
                    pipeline.clone(),
                    Arc::clone(&self.transport),
                    Arc::clone(&registry),
                    Arc::clone(&self.lifecycle),
                    self.lifecycle.shutdown_receiver(),
                )));
            }
        }

        self.lifecycle.set_ready();
        self.transition(&[DispatchState::Unbound, DispatchState::Binding], DispatchState::Ready)?;
        info!(topics = registry.len(), "dispatch router ready");
        Ok(())
    }

    /// Stops taking new messages and waits for in-flight handlers.
    ///
    /// Waits at most `drain_timeout`, then drops every subscription and moves
    /// to `Closed`. Returns `false` if handlers were still running when the
    /// timeout expired.
    pub async fn drain(&self) -> bool {
        let mut entered = false;
        self.state.send_if_modified(|state| {
            if *state >= DispatchState::Draining {
                return false;
            }
            *state = DispatchState::Draining;
            entered = true;
            true
        });
        if !entered {
            return true;
        }
        self.sealed.store(true, Ordering::Release);
        self.lifecycle.trigger_shutdown();

        let listeners: Vec<_> = self.listeners.lock().drain(..).collect();
        for listener in listeners {
            let _ = listener.await;
        }

        let drained = self.lifecycle.wait_for_drain(self.config.drain_timeout).await;
        if drained {
            info!("dispatch router drained");
        } else {
            warn!(
                in_flight = self.lifecycle.in_flight_count(),
                "drain timeout expired with handlers still running"
            );
        }
        self.state.send_replace(DispatchState::Closed);
        drained
    }

    #[must_use]
    pub fn state(&self) -> DispatchState {
        *self.state.borrow()
    }

    /// Resolves once the router has reached `Ready` (or any later state).
    pub async fn ready(&self) -> DispatchState {
        let mut rx = self.state.subscribe();
        let state = match rx.wait_for(|s| *s >= DispatchState::Ready).await {
            Ok(state) => *state,
            Err(_) => DispatchState::Closed,
        };
        state
    }

    /// Snapshot of the topics bound so far and their reply topics.
    #[must_use]
    pub fn registry(&self) -> Arc<TopicRegistry> {
        Arc::new(self.registry.lock().clone())
    }

    /// Number of handlers currently running.
    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.lifecycle.in_flight_count()
    }

    fn transition(&self, from: &[DispatchState], to: DispatchState) -> Result<(), DispatchError> {
        let mut rejected = None;
        self.state.send_if_modified(|state| {
            if from.contains(state) {
                *state = to;
                true
            } else {
                rejected = Some(*state);
                false
            }
        });
        match rejected {
            Some(state) => Err(DispatchError::Sealed { state }),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-topic listener
// ---------------------------------------------------------------------------

/// Serves one subscription until the router drains or the transport closes.
async fn serve_topic<S>(
    mut subscription: Subscription,
    mut pipeline: S,
    transport: Arc<dyn TopicTransport>,
    registry: Arc<TopicRegistry>,
    lifecycle: Arc<ShutdownController>,
    mut stop: watch::Receiver<bool>,
) where
    S: Service<HandlerRequest, Response = Value, Error = HandlerError, Future = HandlerFuture>
        + Send
        + 'static,
{
    let topic = subscription.topic().clone();
    loop {
        let bytes = tokio::select! {
            biased;
            _ = stop.changed() => break,
            next = subscription.recv() => match next {
                Some(bytes) => bytes,
                None => break,
            },
        };

        let mut request = match Envelope::decode(&bytes) {
            Ok(env) if env.kind == EnvelopeKind::Request => env,
            Ok(env) => {
                warn!(topic = %topic, kind = ?env.kind, "ignoring non-request envelope");
                continue;
            }
            Err(e) => {
                warn!(topic = %topic, error = %e, "dropping undecodable message");
                continue;
            }
        };

        let guard = lifecycle.in_flight_guard();
        let reply_topic = request
            .reply_to
            .clone()
            .unwrap_or_else(|| registry.reply_for(&topic));
        let handler_request = HandlerRequest {
            topic: topic.clone(),
            correlation_id: request.correlation_id,
            timeout_ms: request.timeout_ms,
            body: std::mem::take(&mut request.body),
        };
        let call: HandlerFuture = match pipeline.ready().await {
            Ok(svc) => svc.call(handler_request),
            Err(e) => Box::pin(async move { Err(e) }),
        };

        let transport = Arc::clone(&transport);
        tokio::spawn(async move {
            let outcome = match tokio::spawn(call).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_panic() => {
                    warn!(
                        topic = %request.topic,
                        correlation_id = %request.correlation_id,
                        "handler panicked"
                    );
                    Err(HandlerError::internal(format!(
                        "handler for '{}' panicked",
                        request.topic
                    )))
                }
                Err(_) => Err(HandlerError::unavailable(format!(
                    "handler for '{}' was cancelled",
                    request.topic
                ))),
            };
            let reply = match outcome {
                Ok(body) => request.reply(reply_topic.clone(), body),
                Err(err) => {
                    debug!(
                        topic = %request.topic,
                        correlation_id = %request.correlation_id,
                        status = err.status_code(),
                        "handler failed"
                    );
                    request.error_reply(reply_topic.clone(), &err)
                }
            };
            publish_reply(transport.as_ref(), &reply_topic, &reply).await;
            drop(guard);
        });
    }
    debug!(topic = %topic, "topic listener stopped");
}

async fn publish_reply(transport: &dyn TopicTransport, reply_topic: &TopicName, reply: &Envelope) {
    let bytes = match reply.encode() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(reply_topic = %reply_topic, error = %e, "failed to encode reply");
            return;
        }
    };
    if let Err(e) = transport.publish(reply_topic, Bytes::from(bytes)).await {
        warn!(reply_topic = %reply_topic, error = %e, "failed to publish reply");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
