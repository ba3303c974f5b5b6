//! `ContextRouter` – picks the context every incoming message belongs to.
//!
//! Routing is a three-step cascade evaluated against the registry:
//!
//! 1. stay in the current context when the input is relevant enough to it
//!    (or carries no key terms at all);
//! 2. otherwise jump to the most relevant other active context above the
//!    threshold, ties going to enumeration order;
//! 3. otherwise open a new context whose topic is derived from the input.
//!
//! [`ContextRouter::decide`] exposes the pure decision;
//! [`ContextRouter::route`] applies it and attaches the user message.
//!
//! # Example
//!
//! ```rust
//! use recall_context::registry::ContextRegistry;
//! use recall_context::router::ContextRouter;
//! use recall_types::Metadata;
//!
//! let mut registry = ContextRegistry::default();
//! let router = ContextRouter::default();
//! let ctx = router.route(&mut registry, "planning summer vacation italy", Metadata::new());
//! assert_eq!(ctx.topic, "planning summer vacation");
//! assert_eq!(registry.current_id(), Some(ctx.id.as_str()));
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use recall_memory::text::significant_tokens_ordered;
use recall_types::{ConversationContext, ConversationMessage, Metadata, Role, TransitionReason};
use tracing::debug;

use crate::registry::ContextRegistry;
use crate::relevance::{KeywordRelevance, RelevanceScorer, relevance_with_terms};

pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.6;
/// Topic label used when the input has too few significant tokens.
pub const DEFAULT_TOPIC: &str = "General conversation";
/// Number of leading significant tokens that make up a derived topic.
pub const TOPIC_TOKEN_COUNT: usize = 3;

/// Outcome of [`ContextRouter::decide`].
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDecision {
    /// Stay in the current context.
    Continue(String),
    /// Move to another active context.
    Switch(String),
    /// Open a new context with this topic.
    Create(String),
}

#[derive(Clone)]
pub struct ContextRouter {
    scorer: Arc<dyn RelevanceScorer>,
    threshold: f64,
}

impl ContextRouter {
    pub fn new(scorer: Arc<dyn RelevanceScorer>) -> Self {
        Self {
            scorer,
            threshold: DEFAULT_RELEVANCE_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn scorer(&self) -> &dyn RelevanceScorer {
        self.scorer.as_ref()
    }

    /// Relevance of `input` to `context` at `now`.
    pub fn relevance_at(&self, input: &str, context: &ConversationContext, now: DateTime<Utc>) -> f64 {
        let terms = self.scorer.extract_key_terms(input);
        relevance_with_terms(self.scorer.as_ref(), input, &terms, context, now)
    }

    pub fn decide(&self, registry: &ContextRegistry, input: &str) -> RouteDecision {
        self.decide_at(registry, input, Utc::now())
    }

    /// Pure routing decision for `input` at `now`.
    ///
    /// Input without key terms ("ok", "thanks") continues the current
    /// context instead of opening "General conversation": it carries no
    /// topic to route on, and routing it the same way twice must land in the
    /// same place. Without a current context it still creates one.
    pub fn decide_at(&self, registry: &ContextRegistry, input: &str, now: DateTime<Utc>) -> RouteDecision {
        let terms = self.scorer.extract_key_terms(input);
        let scorer = self.scorer.as_ref();

        if let Some(current) = registry.current() {
            if terms.is_empty() {
                return RouteDecision::Continue(current.id.clone());
            }
            let score = relevance_with_terms(scorer, input, &terms, current, now);
            debug!(context = %current.id, score, "current context scored");
            if score > self.threshold {
                return RouteDecision::Continue(current.id.clone());
            }
        }

        let current_id = registry.current_id();
        let mut best: Option<(&ConversationContext, f64)> = None;
        for candidate in registry.active().iter().filter(|c| Some(c.id.as_str()) != current_id) {
            let score = relevance_with_terms(scorer, input, &terms, candidate, now);
            debug!(context = %candidate.id, score, "candidate context scored");
            if score > self.threshold && best.is_none_or(|(_, top)| score > top) {
                best = Some((candidate, score));
            }
        }

        match best {
            Some((context, _)) => RouteDecision::Switch(context.id.clone()),
            None => RouteDecision::Create(self.derive_topic(input)),
        }
    }

    /// Route `input` and attach it as a user message to the chosen context.
    pub fn route(&self, registry: &mut ContextRegistry, input: &str, metadata: Metadata) -> ConversationContext {
        self.route_at(registry, input, metadata, Utc::now())
    }

    pub fn route_at(
        &self,
        registry: &mut ContextRegistry,
        input: &str,
        metadata: Metadata,
        now: DateTime<Utc>,
    ) -> ConversationContext {
        let message = ConversationMessage::at(Role::User, input, now).with_metadata(metadata);
        let decision = self.decide_at(registry, input, now);
        debug!(?decision, "route decided");
        let routed = match decision {
            RouteDecision::Continue(id) => registry.append_message_at(&id, message.clone(), now),
            RouteDecision::Switch(id) => {
                registry.set_current_at(&id, TransitionReason::TopicMatch, now);
                registry.append_message_at(&id, message.clone(), now)
            }
            RouteDecision::Create(_) => None,
        };
        routed.unwrap_or_else(|| self.open_context(registry, input, message, now))
    }

    /// Merge `ids` into one context titled `topic`.
    pub fn merge(&self, registry: &mut ContextRegistry, ids: &[&str], topic: &str) -> Option<ConversationContext> {
        registry.merge_contexts(ids, topic)
    }

    /// The first [`TOPIC_TOKEN_COUNT`] significant tokens of `input`, or
    /// [`DEFAULT_TOPIC`] when there are fewer.
    pub fn derive_topic(&self, input: &str) -> String {
        let tokens = significant_tokens_ordered(input);
        if tokens.len() < TOPIC_TOKEN_COUNT {
            DEFAULT_TOPIC.to_string()
        } else {
            tokens[..TOPIC_TOKEN_COUNT].join(" ")
        }
    }

    fn open_context(
        &self,
        registry: &mut ContextRegistry,
        input: &str,
        message: ConversationMessage,
        now: DateTime<Utc>,
    ) -> ConversationContext {
        let context = registry.create_context_at(&self.derive_topic(input), Some(message), now);
        registry.set_current_at(&context.id, TransitionReason::NewTopic, now);
        context
    }
}

impl Default for ContextRouter {
    fn default() -> Self {
        Self::new(Arc::new(KeywordRelevance::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn route(router: &ContextRouter, registry: &mut ContextRegistry, input: &str, now: DateTime<Utc>) -> ConversationContext {
        router.route_at(registry, input, Metadata::new(), now)
    }

    // ── topics ───────────────────────────────────────────────────────────────

    #[test]
    fn topic_is_first_three_significant_tokens() {
        let router = ContextRouter::default();
        assert_eq!(router.derive_topic("Can you help with my tax return forms?"), "help with return");
        assert_eq!(router.derive_topic("hi there"), DEFAULT_TOPIC);
    }

    // ── decisions ────────────────────────────────────────────────────────────

    #[test]
    fn empty_registry_creates() {
        let router = ContextRouter::default();
        let registry = ContextRegistry::default();
        assert_eq!(
            router.decide(&registry, "planning summer vacation"),
            RouteDecision::Create("planning summer vacation".into())
        );
    }

    #[test]
    fn new_topic_becomes_current_with_transition() {
        let now = Utc::now();
        let router = ContextRouter::default();
        let mut registry = ContextRegistry::default();
        let ctx = route(&router, &mut registry, "planning summer vacation", now);
        assert_eq!(registry.current_id(), Some(ctx.id.as_str()));
        assert_eq!(ctx.message_count(), 1);
        let log: Vec<_> = registry.transitions().collect();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].reason, TransitionReason::NewTopic);
    }

    #[test]
    fn relevant_follow_up_stays() {
        let now = Utc::now();
        let router = ContextRouter::default();
        let mut registry = ContextRegistry::default();
        let first = route(&router, &mut registry, "planning summer vacation", now);
        let second = route(&router, &mut registry, "vacation budget", now + Duration::seconds(10));
        assert_eq!(first.id, second.id);
        assert_eq!(second.message_count(), 2);
        assert_eq!(registry.transitions().count(), 1);
    }

    #[test]
    fn content_free_input_stays_in_current() {
        let now = Utc::now();
        let router = ContextRouter::default();
        let mut registry = ContextRegistry::default();
        let first = route(&router, &mut registry, "planning summer vacation", now);
        let ok = route(&router, &mut registry, "ok!", now + Duration::hours(3));
        assert_eq!(first.id, ok.id);
    }

    #[test]
    fn unrelated_input_opens_new_context() {
        let now = Utc::now();
        let router = ContextRouter::default();
        let mut registry = ContextRegistry::default();
        let travel = route(&router, &mut registry, "planning summer vacation", now);
        let taxes = route(&router, &mut registry, "quarterly taxes deadline", now);
        assert_ne!(travel.id, taxes.id);
        assert_eq!(registry.active().len(), 2);
        assert_eq!(registry.current_id(), Some(taxes.id.as_str()));
    }

    #[test]
    fn returning_to_old_topic_switches() {
        let now = Utc::now();
        let router = ContextRouter::default();
        let mut registry = ContextRegistry::default();
        let travel = route(&router, &mut registry, "planning summer vacation", now);
        route(&router, &mut registry, "quarterly taxes deadline", now);
        let back = route(&router, &mut registry, "summer vacation hotels", now);
        assert_eq!(back.id, travel.id);
        let last = registry.transitions().last().unwrap();
        assert_eq!(last.reason, TransitionReason::TopicMatch);
    }

    #[test]
    fn threshold_is_strict() {
        let now = Utc::now();
        // Fresh context, no overlap, constant pattern 1.0: 0.3 + 0.2 = 0.5.
        let router = ContextRouter::new(Arc::new(KeywordRelevance::new(1.0))).with_threshold(0.5);
        let mut registry = ContextRegistry::default();
        let first = route(&router, &mut registry, "planning summer vacation", now);
        let other = route(&router, &mut registry, "quarterly taxes deadline", now);
        assert_ne!(first.id, other.id);
    }
}
