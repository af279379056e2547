//! Pending-request table: one entry per in-flight correlated request.
//!
//! Entries are keyed by correlation id and hold the oneshot sender that
//! completes the waiting caller. A [`PendingGuard`] owns the entry's lifetime:
//! whichever way the call ends (reply, timeout, transport error, or the
//! caller dropping the future) the guard's `Drop` removes the entry, so a
//! reply arriving afterwards finds nothing to resolve.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dossier_core::{CorrelationId, Envelope, TopicName};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// In-memory record of an outstanding request.
#[derive(Debug)]
pub struct PendingRequest {
    pub topic: TopicName,
    pub reply_topic: TopicName,
    pub issued_at: Instant,
    pub timeout: Duration,
    tx: oneshot::Sender<Envelope>,
}

/// Outcome of handing a reply to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The waiting caller received the reply.
    Delivered,
    /// No entry for this correlation id: the caller timed out or went away.
    Stale,
}

/// Concurrent table of pending requests.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: DashMap<CorrelationId, PendingRequest>,
}

impl PendingTable {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a pending request and returns its guard plus the receiver
    /// the caller awaits.
    pub fn insert(
        self: &Arc<Self>,
        correlation_id: CorrelationId,
        topic: TopicName,
        reply_topic: TopicName,
        timeout: Duration,
    ) -> (PendingGuard, oneshot::Receiver<Envelope>) {
        let (tx, rx) = oneshot::channel();
        self.entries.insert(
            correlation_id,
            PendingRequest {
                topic,
                reply_topic,
                issued_at: Instant::now(),
                timeout,
                tx,
            },
        );
        let guard = PendingGuard {
            table: Arc::clone(self),
            correlation_id,
        };
        (guard, rx)
    }

    /// Resolves the pending request matching `reply.correlation_id`.
    pub fn complete(&self, reply: Envelope) -> Completion {
        match self.entries.remove(&reply.correlation_id) {
            Some((_, pending)) => match pending.tx.send(reply) {
                Ok(()) => Completion::Delivered,
                Err(_) => Completion::Stale,
            },
            None => Completion::Stale,
        }
    }

    /// Drops every pending request waiting on `reply_topic`. Their callers
    /// observe a closed channel and fail with a transport error.
    pub fn abandon_reply_topic(&self, reply_topic: &TopicName) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, p| &p.reply_topic != reply_topic);
        before.saturating_sub(self.entries.len())
    }

    /// Drops every pending request.
    pub fn abandon_all(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn contains(&self, correlation_id: &CorrelationId) -> bool {
        self.entries.contains_key(correlation_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove(&self, correlation_id: &CorrelationId) {
        self.entries.remove(correlation_id);
    }
}

/// RAII handle removing its pending entry on drop.
#[derive(Debug)]
pub struct PendingGuard {
    table: Arc<PendingTable>,
    correlation_id: CorrelationId,
}

impl PendingGuard {
    #[must_use]
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.table.remove(&self.correlation_id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
