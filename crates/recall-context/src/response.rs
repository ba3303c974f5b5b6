//! Response generation seam.
//!
//! The core never writes natural-language replies itself. A session hands a
//! [`ResponseRequest`] to a [`ResponseGenerator`] (an LLM client, a template
//! engine, a test stub) and folds the [`GeneratedResponse`] back into its
//! state: the text is appended to the context and follow-up topics go to the
//! pending queue.

use recall_memory::{MemoryItem, PersonalizationProfile};
use recall_types::{ConversationContext, Metadata, PendingTopic};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResponseError {
    #[error("Response generator unavailable: {0}")]
    Unavailable(String),

    #[error("Response generation failed: {0}")]
    Failed(String),
}

/// Everything a generator needs to reply to one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRequest {
    /// The user's raw input.
    pub input: String,
    /// The context the input was routed to, including the new message.
    pub context: ConversationContext,
    /// A queued topic worth raising in this reply, if any.
    pub pending_topic: Option<PendingTopic>,
    /// Memories relevant to the input, best first.
    pub memories: Vec<MemoryItem>,
    pub profile: PersonalizationProfile,
}

/// A topic the generator wants revisited later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpTopic {
    pub topic: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeneratedResponse {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub follow_up_topics: Vec<FollowUpTopic>,
}

impl GeneratedResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_follow_up(mut self, topic: impl Into<String>, importance: f64) -> Self {
        self.follow_up_topics.push(FollowUpTopic {
            topic: topic.into(),
            importance,
        });
        self
    }
}

pub trait ResponseGenerator: Send + Sync {
    fn generate(&self, request: &ResponseRequest) -> Result<GeneratedResponse, ResponseError>;
}

impl<F> ResponseGenerator for F
where
    F: Fn(&ResponseRequest) -> Result<GeneratedResponse, ResponseError> + Send + Sync,
{
    fn generate(&self, request: &ResponseRequest) -> Result<GeneratedResponse, ResponseError> {
        self(request)
    }
}
