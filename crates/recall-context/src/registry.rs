//! `ContextRegistry` – the working set of live conversation contexts.
//!
//! Holds at most `max_active` contexts in enumeration (insertion) order, a
//! pointer to the current one and a bounded audit log of every pointer move.
//! Contexts are values: updates build a new [`ConversationContext`] and swap
//! it in by id.
//!
//! Contexts that leave the working set (merged away or evicted for low
//! activity) are parked in a retired list; drain it with
//! [`ContextRegistry::take_retired`] to archive them.
//!
//! # Example
//!
//! ```rust
//! use recall_context::registry::{ContextRegistry, RegistryConfig};
//! use recall_types::ConversationMessage;
//!
//! let mut registry = ContextRegistry::new(RegistryConfig::default());
//! let a = registry.create_context("billing", Some(ConversationMessage::user("invoice")));
//! let b = registry.create_context("refunds", None);
//! let merged = registry
//!     .merge_contexts(&[a.id.as_str(), b.id.as_str()], "billing and refunds")
//!     .unwrap();
//! assert_eq!(registry.current().map(|c| c.id.clone()), Some(merged.id));
//! assert_eq!(registry.active().len(), 1);
//! ```

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use recall_types::{
    ContextMetadata, ContextTransition, ConversationContext, ConversationMessage, Metadata, Role,
    TransitionReason,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::events::{ContextEvent, ContextEventReceiver, ContextEvents};
use crate::relevance::{NoValues, ValuesProvider, recency_score};

pub const DEFAULT_MAX_ACTIVE_CONTEXTS: usize = 10;
pub const DEFAULT_TRANSITION_LIMIT: usize = 1000;

/// Smallest working set the registry accepts: room for the current context
/// plus the one being written, so eviction always has a victim.
pub const MIN_ACTIVE_CONTEXTS: usize = 2;

/// Message count at which the size half of the activity score saturates.
const ACTIVITY_MESSAGE_SATURATION: f64 = 10.0;

/// Registry limits.
///
/// `max_active` below [`MIN_ACTIVE_CONTEXTS`] is raised to it when the
/// registry is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub max_active: usize,
    pub transition_limit: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_active: DEFAULT_MAX_ACTIVE_CONTEXTS,
            transition_limit: DEFAULT_TRANSITION_LIMIT,
        }
    }
}

/// Activity score used to pick eviction victims:
/// `0.7 × recency + 0.3 × min(1, messages / 10)`.
pub fn activity_score(context: &ConversationContext, now: DateTime<Utc>) -> f64 {
    let recency = recency_score(now - context.last_activity());
    let size = (context.message_count() as f64 / ACTIVITY_MESSAGE_SATURATION).min(1.0);
    0.7 * recency + 0.3 * size
}

pub struct ContextRegistry {
    config: RegistryConfig,
    active: Vec<ConversationContext>,
    current: Option<String>,
    transitions: VecDeque<ContextTransition>,
    retired: Vec<ConversationContext>,
    values: Arc<dyn ValuesProvider>,
    events: ContextEvents,
}

impl ContextRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_values(config, Arc::new(NoValues))
    }

    /// A registry whose new contexts are tagged by `values`.
    pub fn with_values(config: RegistryConfig, values: Arc<dyn ValuesProvider>) -> Self {
        Self {
            config: RegistryConfig {
                max_active: config.max_active.max(MIN_ACTIVE_CONTEXTS),
                transition_limit: config.transition_limit,
            },
            active: Vec::new(),
            current: None,
            transitions: VecDeque::new(),
            retired: Vec::new(),
            values,
            events: ContextEvents::default(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // ── reads ───────────────────────────────────────────────────────────────

    /// Active contexts in enumeration order.
    pub fn active(&self) -> &[ConversationContext] {
        &self.active
    }

    pub fn get(&self, id: &str) -> Option<&ConversationContext> {
        self.active.iter().find(|c| c.id == id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current(&self) -> Option<&ConversationContext> {
        self.current.as_deref().and_then(|id| self.get(id))
    }

    /// Transition log, oldest first.
    pub fn transitions(&self) -> impl Iterator<Item = &ContextTransition> {
        self.transitions.iter()
    }

    pub fn subscribe(&self) -> ContextEventReceiver {
        self.events.subscribe()
    }

    /// Drain contexts that were merged away or evicted since the last call.
    pub fn take_retired(&mut self) -> Vec<ConversationContext> {
        std::mem::take(&mut self.retired)
    }

    /// Put back contexts that could not be archived.
    pub fn requeue_retired(&mut self, mut contexts: Vec<ConversationContext>) {
        contexts.append(&mut self.retired);
        self.retired = contexts;
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    /// Create a context, seed it with `initial_message` and add it to the
    /// working set. The current pointer does not move.
    pub fn create_context(
        &mut self,
        topic: &str,
        initial_message: Option<ConversationMessage>,
    ) -> ConversationContext {
        self.create_context_at(topic, initial_message, Utc::now())
    }

    pub fn create_context_at(
        &mut self,
        topic: &str,
        initial_message: Option<ConversationMessage>,
        now: DateTime<Utc>,
    ) -> ConversationContext {
        let metadata = ContextMetadata {
            related_values: self.values.related_values(topic).into_iter().collect(),
            ..ContextMetadata::default()
        };
        let mut context = ConversationContext::new_at(topic, now).with_metadata(metadata);
        if let Some(message) = initial_message {
            context = context.with_message(message);
        }
        info!(id = %context.id, topic, "context created");
        self.events.publish(ContextEvent::Created {
            id: context.id.clone(),
            topic: context.topic.clone(),
        });
        self.update_active_at(context.clone(), now);
        context
    }

    /// Make `id` current, logging an explicit switch.
    pub fn switch_context(&mut self, id: &str) -> Option<ConversationContext> {
        self.switch_context_at(id, Utc::now())
    }

    pub fn switch_context_at(&mut self, id: &str, now: DateTime<Utc>) -> Option<ConversationContext> {
        self.set_current_at(id, TransitionReason::ExplicitSwitch, now)
    }

    /// Move the current pointer to `id` and log the move with `reason`.
    ///
    /// Returns `None` without side effects when `id` is not active.
    pub fn set_current(&mut self, id: &str, reason: TransitionReason) -> Option<ConversationContext> {
        self.set_current_at(id, reason, Utc::now())
    }

    pub fn set_current_at(
        &mut self,
        id: &str,
        reason: TransitionReason,
        now: DateTime<Utc>,
    ) -> Option<ConversationContext> {
        let context = self.get(id)?.clone();
        let from = self.current.replace(context.id.clone());
        debug!(from = ?from, to = %context.id, ?reason, "current context moved");
        self.record_transition(ContextTransition {
            from: from.clone(),
            to: context.id.clone(),
            timestamp: now,
            reason,
        });
        self.events.publish(ContextEvent::Switched {
            from,
            to: context.id.clone(),
            reason,
        });
        Some(context)
    }

    /// Combine two or more active contexts into one.
    ///
    /// Unknown and repeated ids are ignored; fewer than two remaining ids is a
    /// no-op returning `None`. Messages are merged by timestamp, ties keeping
    /// the order of `ids`. The merged context becomes current and one
    /// [`TransitionReason::ContextMerge`] entry is logged per source.
    pub fn merge_contexts(&mut self, ids: &[&str], new_topic: &str) -> Option<ConversationContext> {
        self.merge_contexts_at(ids, new_topic, Utc::now())
    }

    pub fn merge_contexts_at(
        &mut self,
        ids: &[&str],
        new_topic: &str,
        now: DateTime<Utc>,
    ) -> Option<ConversationContext> {
        let mut seen = HashSet::new();
        let sources: Vec<ConversationContext> = ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| self.get(id).cloned())
            .collect();
        if sources.len() < 2 {
            debug!(requested = ids.len(), valid = sources.len(), "merge skipped");
            return None;
        }

        // Sources are visited in argument order and the sort is stable, so
        // equal timestamps keep that order.
        let mut messages: Vec<ConversationMessage> = sources
            .iter()
            .flat_map(|c| c.messages().iter().cloned())
            .collect();
        messages.sort_by_key(|m| m.timestamp);

        let importance = sources
            .iter()
            .map(|c| c.metadata.importance)
            .fold(f64::NEG_INFINITY, f64::max);
        let mut related_values: Vec<String> = Vec::new();
        let mut tagged = BTreeSet::new();
        let topic_values = self.values.related_values(new_topic);
        for value in sources
            .iter()
            .flat_map(|c| c.metadata.related_values.iter())
            .chain(topic_values.iter())
        {
            if tagged.insert(value.clone()) {
                related_values.push(value.clone());
            }
        }

        let shell = ConversationContext::new_at(new_topic, now);
        let merged = ConversationContext::from_parts(
            shell.id,
            shell.topic,
            now,
            messages,
            ContextMetadata {
                importance,
                related_values,
            },
        );

        let source_ids: Vec<String> = sources.iter().map(|c| c.id.clone()).collect();
        self.active.retain(|c| !source_ids.contains(&c.id));
        self.retired.extend(sources);
        self.active.push(merged.clone());
        for source in &source_ids {
            self.record_transition(ContextTransition {
                from: Some(source.clone()),
                to: merged.id.clone(),
                timestamp: now,
                reason: TransitionReason::ContextMerge,
            });
        }
        self.current = Some(merged.id.clone());
        info!(into = %merged.id, sources = source_ids.len(), topic = new_topic, "contexts merged");
        self.events.publish(ContextEvent::Merged {
            sources: source_ids,
            into: merged.id.clone(),
        });
        self.evict_inactive(now, &merged.id);
        Some(merged)
    }

    // ── updates ─────────────────────────────────────────────────────────────

    /// Replace the context with the same id, or insert it, then evict down
    /// to the cap.
    pub fn update_active(&mut self, context: ConversationContext) {
        self.update_active_at(context, Utc::now())
    }

    /// [`update_active`][Self::update_active] with an explicit clock.
    ///
    /// Victims are the lowest [`activity_score`]; the current context and the
    /// context being written are never evicted.
    pub fn update_active_at(&mut self, context: ConversationContext, now: DateTime<Utc>) {
        let id = context.id.clone();
        let message_count = context.message_count();
        match self.active.iter_mut().find(|c| c.id == id) {
            Some(slot) => *slot = context,
            None => self.active.push(context),
        }
        self.events.publish(ContextEvent::Updated { id: id.clone(), message_count });
        self.evict_inactive(now, &id);
    }

    /// Append `message` to context `id`.
    pub fn append_message(&mut self, id: &str, message: ConversationMessage) -> Option<ConversationContext> {
        self.append_message_at(id, message, Utc::now())
    }

    pub fn append_message_at(
        &mut self,
        id: &str,
        message: ConversationMessage,
        now: DateTime<Utc>,
    ) -> Option<ConversationContext> {
        let next = self.get(id)?.with_message(message);
        self.update_active_at(next.clone(), now);
        Some(next)
    }

    /// Append an agent reply to context `id`.
    pub fn append_response(&mut self, id: &str, content: &str, metadata: Metadata) -> Option<ConversationContext> {
        self.append_response_at(id, content, metadata, Utc::now())
    }

    pub fn append_response_at(
        &mut self,
        id: &str,
        content: &str,
        metadata: Metadata,
        now: DateTime<Utc>,
    ) -> Option<ConversationContext> {
        let message = ConversationMessage::at(Role::Agent, content, now).with_metadata(metadata);
        self.append_message_at(id, message, now)
    }

    /// Append to the transition log, dropping the oldest entry past the limit.
    pub fn record_transition(&mut self, transition: ContextTransition) {
        self.transitions.push_back(transition);
        while self.transitions.len() > self.config.transition_limit {
            self.transitions.pop_front();
        }
    }

    /// Replace the whole state, e.g. from a snapshot.
    ///
    /// Contexts past the cap are dropped from the front; a current id that is
    /// not among the contexts is cleared.
    pub fn restore(
        &mut self,
        contexts: Vec<ConversationContext>,
        current: Option<String>,
        transitions: Vec<ContextTransition>,
    ) {
        let excess = contexts.len().saturating_sub(self.config.max_active);
        self.active = contexts.into_iter().skip(excess).collect();
        self.current = current.filter(|id| self.active.iter().any(|c| &c.id == id));
        self.transitions.clear();
        for transition in transitions {
            self.record_transition(transition);
        }
        self.retired.clear();
        debug!(contexts = self.active.len(), "registry restored");
    }

    fn evict_inactive(&mut self, now: DateTime<Utc>, keep: &str) {
        while self.active.len() > self.config.max_active {
            let victim = self
                .active
                .iter()
                .enumerate()
                .filter(|(_, c)| c.id != keep && Some(c.id.as_str()) != self.current.as_deref())
                .min_by(|(_, a), (_, b)| activity_score(a, now).total_cmp(&activity_score(b, now)))
                .map(|(idx, _)| idx);
            let Some(idx) = victim else {
                break;
            };
            let evicted = self.active.remove(idx);
            info!(id = %evicted.id, topic = %evicted.topic, "context evicted");
            self.events.publish(ContextEvent::Evicted { id: evicted.id.clone() });
            self.retired.push(evicted);
        }
    }
}

impl Default for ContextRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
