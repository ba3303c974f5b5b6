//! `PendingTopicQueue` – topics to raise proactively in a later reply.
//!
//! Bounded to [`MAX_PENDING_TOPICS`] entries kept in descending importance;
//! entries older than a day are dropped whenever the queue is touched.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use recall_memory::text::{overlap_ratio, significant_tokens};
use recall_types::{ConversationContext, PendingTopic};
use tracing::debug;

pub const MAX_PENDING_TOPICS: usize = 5;
pub const MAX_PENDING_TOPIC_AGE_HOURS: i64 = 24;
/// Topics below this importance are never surfaced.
pub const MIN_SELECT_IMPORTANCE: f64 = 0.7;
/// Share of a topic's terms that must appear in the context to surface it.
pub const MIN_SELECT_OVERLAP: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct PendingTopicQueue {
    topics: Vec<PendingTopic>,
    capacity: usize,
    max_age: Duration,
}

impl PendingTopicQueue {
    pub fn new() -> Self {
        Self::with_limits(MAX_PENDING_TOPICS, Duration::hours(MAX_PENDING_TOPIC_AGE_HOURS))
    }

    pub fn with_limits(capacity: usize, max_age: Duration) -> Self {
        Self {
            topics: Vec::new(),
            capacity,
            max_age,
        }
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// Queued topics, most important first.
    pub fn topics(&self) -> &[PendingTopic] {
        &self.topics
    }

    /// Queue `topic`. Re-adding a topic (case-insensitive) replaces the old
    /// entry and keeps the higher importance.
    pub fn add(&mut self, topic: &str, importance: f64, relevant_context: Option<String>) {
        self.add_at(topic, importance, relevant_context, Utc::now())
    }

    pub fn add_at(
        &mut self,
        topic: &str,
        importance: f64,
        relevant_context: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.age_out_at(now);
        let mut importance = if importance.is_nan() { 0.0 } else { importance.clamp(0.0, 1.0) };
        if let Some(pos) = self
            .topics
            .iter()
            .position(|t| t.topic.eq_ignore_ascii_case(topic))
        {
            importance = importance.max(self.topics.remove(pos).importance);
        }
        self.topics.push(PendingTopic {
            topic: topic.to_string(),
            importance,
            added_at: now,
            relevant_context,
        });
        self.topics.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        if self.topics.len() > self.capacity {
            for dropped in self.topics.drain(self.capacity..) {
                debug!(topic = %dropped.topic, importance = dropped.importance, "pending topic dropped");
            }
        }
    }

    /// Remove and return the first important topic that fits `context`.
    pub fn select_if_relevant(&mut self, context: &ConversationContext) -> Option<PendingTopic> {
        self.select_if_relevant_at(context, Utc::now())
    }

    pub fn select_if_relevant_at(
        &mut self,
        context: &ConversationContext,
        now: DateTime<Utc>,
    ) -> Option<PendingTopic> {
        self.age_out_at(now);
        let context_terms: HashSet<String> = context
            .texts()
            .flat_map(significant_tokens)
            .collect();
        let pos = self.topics.iter().position(|t| {
            t.importance >= MIN_SELECT_IMPORTANCE
                && overlap_ratio(&context_terms, &significant_tokens(&t.topic)) > MIN_SELECT_OVERLAP
        })?;
        let selected = self.topics.remove(pos);
        debug!(topic = %selected.topic, context = %context.id, "pending topic selected");
        Some(selected)
    }

    /// Drop entries older than the age limit; returns how many went.
    pub fn age_out(&mut self) -> usize {
        self.age_out_at(Utc::now())
    }

    pub fn age_out_at(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.topics.len();
        let max_age = self.max_age;
        self.topics.retain(|t| now - t.added_at <= max_age);
        before - self.topics.len()
    }

    /// Replace the queue contents, re-applying ordering and the bound.
    pub fn restore(&mut self, mut topics: Vec<PendingTopic>) {
        topics.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        topics.truncate(self.capacity);
        self.topics = topics;
    }
}

impl Default for PendingTopicQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_types::ConversationMessage;

    fn names(queue: &PendingTopicQueue) -> Vec<&str> {
        queue.topics().iter().map(|t| t.topic.as_str()).collect()
    }

    #[test]
    fn add_keeps_descending_order() {
        let mut queue = PendingTopicQueue::new();
        queue.add("alpha", 0.3, None);
        queue.add("bravo", 0.9, None);
        queue.add("charlie", 0.6, None);
        assert_eq!(names(&queue), vec!["bravo", "charlie", "alpha"]);
    }

    #[test]
    fn equal_importance_keeps_insertion_order() {
        let mut queue = PendingTopicQueue::new();
        queue.add("first", 0.5, None);
        queue.add("second", 0.5, None);
        assert_eq!(names(&queue), vec!["first", "second"]);
    }

    #[test]
    fn importance_is_clamped() {
        let mut queue = PendingTopicQueue::new();
        queue.add("loud", 4.0, None);
        queue.add("negative", -1.0, None);
        assert_eq!(queue.topics()[0].importance, 1.0);
        assert_eq!(queue.topics()[1].importance, 0.0);
    }

    #[test]
    fn readding_topic_keeps_max_importance() {
        let mut queue = PendingTopicQueue::new();
        queue.add("Garden", 0.8, None);
        queue.add("garden", 0.4, Some("ctx".into()));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.topics()[0].importance, 0.8);
        assert_eq!(queue.topics()[0].relevant_context.as_deref(), Some("ctx"));
    }

    #[test]
    fn old_topics_age_out() {
        let t0 = Utc::now();
        let mut queue = PendingTopicQueue::new();
        queue.add_at("ancient", 0.9, None, t0);
        queue.add_at("recent", 0.9, None, t0 + Duration::hours(10));
        assert_eq!(queue.age_out_at(t0 + Duration::hours(25)), 1);
        assert_eq!(names(&queue), vec!["recent"]);
    }

    #[test]
    fn select_requires_importance_and_overlap() {
        let now = Utc::now();
        let mut queue = PendingTopicQueue::new();
        queue.add_at("vacation flights", 0.5, None, now);
        queue.add_at("vacation budget", 0.8, None, now);
        queue.add_at("garden tomatoes", 0.9, None, now);
        let ctx = ConversationContext::new_at("travel", now).with_message(ConversationMessage::user(
            "planning the vacation budget and flights",
        ));
        let selected = queue.select_if_relevant_at(&ctx, now).unwrap();
        assert_eq!(selected.topic, "vacation budget");
        assert_eq!(queue.len(), 2);
        // "vacation flights" overlaps fully but is not important enough.
        assert!(queue.select_if_relevant_at(&ctx, now).is_none());
    }

    #[test]
    fn half_overlap_is_not_enough() {
        let now = Utc::now();
        let mut queue = PendingTopicQueue::new();
        queue.add_at("vacation budget", 0.9, None, now);
        let ctx = ConversationContext::new_at("vacation", now);
        assert!(queue.select_if_relevant_at(&ctx, now).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn restore_reapplies_bound() {
        let now = Utc::now();
        let mut queue = PendingTopicQueue::new();
        let topics = (0..8)
            .map(|i| PendingTopic {
                topic: format!("topic {i}"),
                importance: i as f64 / 10.0,
                added_at: now,
                relevant_context: None,
            })
            .collect();
        queue.restore(topics);
        assert_eq!(queue.len(), MAX_PENDING_TOPICS);
        assert_eq!(queue.topics()[0].topic, "topic 7");
    }
}
