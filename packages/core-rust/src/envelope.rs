//! Envelopes: the unit exchanged over the topic transport.
//!
//! An envelope wraps an opaque JSON body with the routing metadata the
//! correlation layer needs: the correlation id that pairs a reply with its
//! request, the topic it was published on and the reply topic the answer
//! must go to. The transport never looks inside; envelopes travel as named
//! `MsgPack` (`rmp_serde::to_vec_named`).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ErrorKind, HandlerError};
use crate::topic::TopicName;

// ---------------------------------------------------------------------------
// CorrelationId
// ---------------------------------------------------------------------------

/// Value uniquely associating a request with its eventual reply.
///
/// Generated by the requesting side (UUID v4), echoed untouched by the
/// responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generates a fresh random correlation id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Discriminates what an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    /// A request published by a correlation client.
    Request,
    /// A successful handler result.
    Reply,
    /// A business failure reported by a handler.
    Error,
}

/// Error details carried by `EnvelopeKind::Error` envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_kind: ErrorKind,
    pub status_code: u16,
    pub message: String,
}

impl From<&HandlerError> for ErrorBody {
    fn from(err: &HandlerError) -> Self {
        Self {
            error_kind: err.kind,
            status_code: err.status_code(),
            message: err.message.clone(),
        }
    }
}

/// A request, reply or error travelling over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub correlation_id: CorrelationId,
    pub kind: EnvelopeKind,
    /// Topic this envelope was published on.
    pub topic: TopicName,
    /// Where the responder must publish its answer. Requests only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<TopicName>,
    /// The caller's timeout budget in milliseconds. Requests only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Envelope {
    /// Builds a request envelope with a fresh correlation id.
    #[must_use]
    pub fn request(topic: TopicName, reply_to: TopicName, body: Value, timeout_ms: u64) -> Self {
        Self {
            correlation_id: CorrelationId::generate(),
            kind: EnvelopeKind::Request,
            topic,
            reply_to: Some(reply_to),
            timeout_ms: Some(timeout_ms),
            body,
            error: None,
        }
    }

    /// Builds the successful reply to this request, published on `reply_topic`.
    #[must_use]
    pub fn reply(&self, reply_topic: TopicName, body: Value) -> Self {
        Self {
            correlation_id: self.correlation_id,
            kind: EnvelopeKind::Reply,
            topic: reply_topic,
            reply_to: None,
            timeout_ms: None,
            body,
            error: None,
        }
    }

    /// Builds the error reply to this request, published on `reply_topic`.
    #[must_use]
    pub fn error_reply(&self, reply_topic: TopicName, err: &HandlerError) -> Self {
        Self {
            correlation_id: self.correlation_id,
            kind: EnvelopeKind::Error,
            topic: reply_topic,
            reply_to: None,
            timeout_ms: None,
            body: Value::Null,
            error: Some(ErrorBody::from(err)),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == EnvelopeKind::Error
    }

    /// Encodes to named `MsgPack` for the wire.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Encode` if the body cannot be serialized.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        rmp_serde::to_vec_named(self).map_err(|e| EnvelopeError::Encode(e.to_string()))
    }

    /// Decodes an envelope received from the wire.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Decode` for bytes that are not a valid envelope.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        rmp_serde::from_slice(bytes).map_err(|e| EnvelopeError::Decode(e.to_string()))
    }
}

/// Wire codec failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("failed to encode envelope: {0}")]
    Encode(String),
    #[error("failed to decode envelope: {0}")]
    Decode(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
