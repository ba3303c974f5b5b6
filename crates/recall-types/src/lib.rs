use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Who produced a [`ConversationMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The human on the other side of the session.
    User,
    /// The assistant (text produced by the response-generation collaborator).
    Agent,
}

/// A typed metadata value attached to a message.
///
/// Only the shapes the core actually consumes are representable; there is no
/// catch-all "any" variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MetadataValue {
    Text(String),
    Number(f64),
    Flag(bool),
    List(Vec<String>),
}

/// Ordered metadata map carried by messages and generated responses.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single utterance inside a conversation context. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ConversationMessage {
    /// Build a message stamped with the current UTC time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self::at(role, content, Utc::now())
    }

    /// Build a message with an explicit timestamp.
    pub fn at(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            content: content.into(),
            timestamp,
            role,
            metadata: Metadata::new(),
        }
    }

    /// Shorthand for a [`Role::User`] message stamped now.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Shorthand for a [`Role::Agent`] message stamped now.
    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(Role::Agent, content)
    }

    /// Return the message with `metadata` attached (builder style).
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Metadata the core reads from a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    /// Importance in `[0.0, 1.0]`. Drives which topics get queued for later.
    pub importance: f64,
    /// Value tags supplied by the values collaborator. Never drives behaviour.
    pub related_values: Vec<String>,
}

impl Default for ContextMetadata {
    fn default() -> Self {
        Self {
            importance: 0.5,
            related_values: Vec::new(),
        }
    }
}

/// A live conversation thread.
///
/// Contexts have value semantics: every update builds a new instance (see
/// [`ConversationContext::with_message`]) and the owning registry swaps it in.
/// Messages are append-only and keep insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationContext {
    pub id: String,
    pub topic: String,
    pub created_at: DateTime<Utc>,
    messages: Vec<ConversationMessage>,
    pub metadata: ContextMetadata,
}

impl ConversationContext {
    /// A fresh, empty context with a random v4 id, created now.
    pub fn new(topic: impl Into<String>) -> Self {
        Self::new_at(topic, Utc::now())
    }

    /// A fresh, empty context created at `created_at`.
    pub fn new_at(topic: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self::from_parts(
            Uuid::new_v4().to_string(),
            topic.into(),
            created_at,
            Vec::new(),
            ContextMetadata::default(),
        )
    }

    /// Assemble a context from already-ordered parts (used by merges and
    /// snapshot restore).
    pub fn from_parts(
        id: String,
        topic: String,
        created_at: DateTime<Utc>,
        messages: Vec<ConversationMessage>,
        metadata: ContextMetadata,
    ) -> Self {
        Self {
            id,
            topic,
            created_at,
            messages,
            metadata,
        }
    }

    /// Messages in insertion order.
    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// A new context equal to this one with `message` appended.
    pub fn with_message(&self, message: ConversationMessage) -> Self {
        let mut next = self.clone();
        next.messages.push(message);
        next
    }

    /// A new context equal to this one with replaced metadata.
    pub fn with_metadata(&self, metadata: ContextMetadata) -> Self {
        let mut next = self.clone();
        next.metadata = metadata;
        next
    }

    /// Timestamp of the most recent message, or the creation time when the
    /// context is still empty.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.messages
            .iter()
            .map(|m| m.timestamp)
            .max()
            .map_or(self.created_at, |t| t.max(self.created_at))
    }

    /// The topic label followed by every message body.
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.topic.as_str()).chain(self.messages.iter().map(|m| m.content.as_str()))
    }
}

/// Why the current-context pointer moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionReason {
    TopicMatch,
    ExplicitSwitch,
    NewTopic,
    ContextMerge,
}

/// One entry of the context transition audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextTransition {
    /// Previous current context, `None` when there was none.
    pub from: Option<String>,
    pub to: String,
    pub timestamp: DateTime<Utc>,
    pub reason: TransitionReason,
}

/// A topic queued to be raised proactively in a later response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTopic {
    pub topic: String,
    /// Importance in `[0.0, 1.0]`.
    pub importance: f64,
    pub added_at: DateTime<Utc>,
    /// Lookup-only back-reference to the context the topic came from.
    pub relevant_context: Option<String>,
}

/// Errors shared by the memory and context crates.
///
/// Absence (unknown key, unknown context id, merge with fewer than two valid
/// ids) is not an error; those paths return `Option::None`.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecallError {
    #[error("Capacity violated: {len} items stored, limit is {max}")]
    CapacityViolation { len: usize, max: usize },

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Serialization failure: {0}")]
    Serialization(String),
}
