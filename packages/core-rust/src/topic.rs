//! Topic names and the request-topic -> reply-topic registry.
//!
//! Topics follow the `"<resource>.<operation>"` convention, e.g.
//! `documents.create` or `processDocuments.find-by-process`. The resource
//! segment is camelCase, every following segment is kebab-case. Each request
//! topic has a paired reply topic named `"<topic>.reply"`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Suffix appended to a request topic to derive its reply topic.
pub const REPLY_SUFFIX: &str = "reply";

static TOPIC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][A-Za-z0-9]*(\.[a-z][a-z0-9]*(-[a-z0-9]+)*)+$")
        .unwrap_or_else(|e| unreachable!("topic pattern is a valid regex: {e}"))
});

// ---------------------------------------------------------------------------
// TopicError
// ---------------------------------------------------------------------------

/// Errors produced when parsing topic names or populating a registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("topic name must not be empty")]
    Empty,
    #[error("malformed topic name '{0}', expected '<resource>.<operation>'")]
    Malformed(String),
    #[error("'{0}' is a reply topic and cannot be registered as a request topic")]
    ReplyTopic(String),
    #[error("topic '{0}' is already registered")]
    Duplicate(String),
}

// ---------------------------------------------------------------------------
// TopicName
// ---------------------------------------------------------------------------

/// A validated topic name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TopicName(String);

impl TopicName {
    /// Parses and validates a topic name.
    ///
    /// # Errors
    ///
    /// Returns `TopicError::Empty` for an empty string and
    /// `TopicError::Malformed` when the name does not follow the
    /// `"<resource>.<operation>"` convention.
    pub fn parse(name: impl Into<String>) -> Result<Self, TopicError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TopicError::Empty);
        }
        if !TOPIC_PATTERN.is_match(&name) {
            return Err(TopicError::Malformed(name));
        }
        Ok(Self(name))
    }

    /// Builds `"<resource>.<operation>"` from its two parts.
    ///
    /// # Errors
    ///
    /// Returns `TopicError::Malformed` if either part breaks the naming rules.
    pub fn from_parts(resource: &str, operation: &str) -> Result<Self, TopicError> {
        Self::parse(format!("{resource}.{operation}"))
    }

    /// The raw topic string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The resource segment (everything before the first dot).
    #[must_use]
    pub fn resource(&self) -> &str {
        self.0.split('.').next().unwrap_or_default()
    }

    /// Whether this topic is a reply topic by convention.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        self.0
            .rsplit_once('.')
            .is_some_and(|(_, last)| last == REPLY_SUFFIX)
    }

    /// Derives the reply topic by convention: `"<topic>.reply"`.
    #[must_use]
    pub fn reply_topic(&self) -> TopicName {
        TopicName(format!("{}.{REPLY_SUFFIX}", self.0))
    }
}

impl fmt::Display for TopicName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TopicName {
    type Error = TopicError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TopicName> for String {
    fn from(value: TopicName) -> Self {
        value.0
    }
}

impl AsRef<str> for TopicName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// TopicRegistry
// ---------------------------------------------------------------------------

/// Explicit mapping of request topics to their reply topics.
///
/// Populated once at startup while the dispatch router binds its handlers,
/// then shared read-only with every correlation client. Iteration order is
/// sorted so subscription setup is deterministic.
#[derive(Debug, Clone, Default)]
pub struct TopicRegistry {
    replies: BTreeMap<TopicName, TopicName>,
}

impl TopicRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request topic with its conventional reply topic.
    ///
    /// # Errors
    ///
    /// Rejects reply topics and topics that are already registered.
    pub fn register(&mut self, topic: TopicName) -> Result<&TopicName, TopicError> {
        if topic.is_reply() {
            return Err(TopicError::ReplyTopic(topic.0));
        }
        if self.replies.contains_key(&topic) {
            return Err(TopicError::Duplicate(topic.0));
        }
        let reply = topic.reply_topic();
        Ok(self.replies.entry(topic).or_insert(reply))
    }

    /// The registered reply topic for `topic`, if any.
    #[must_use]
    pub fn reply_topic(&self, topic: &TopicName) -> Option<&TopicName> {
        self.replies.get(topic)
    }

    /// The registered reply topic, falling back to the naming convention for
    /// topics nobody registered.
    #[must_use]
    pub fn reply_for(&self, topic: &TopicName) -> TopicName {
        self.reply_topic(topic)
            .cloned()
            .unwrap_or_else(|| topic.reply_topic())
    }

    #[must_use]
    pub fn contains(&self, topic: &TopicName) -> bool {
        self.replies.contains_key(topic)
    }

    /// All registered request topics, sorted.
    pub fn topics(&self) -> impl Iterator<Item = &TopicName> {
        self.replies.keys()
    }

    /// All registered reply topics, in request-topic order.
    pub fn reply_topics(&self) -> impl Iterator<Item = &TopicName> {
        self.replies.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.replies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
