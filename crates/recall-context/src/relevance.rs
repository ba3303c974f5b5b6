//! Relevance scoring between user input and conversation contexts.
//!
//! The router blends three signals into one score in `[0.0, 1.0]`:
//!
//! | Signal | Weight | Source |
//! |---|---|---|
//! | Recency | 0.3 | [`recency_score`] over the gap since the context's last activity |
//! | Overlap | 0.5 | share of the input's key terms found in the context |
//! | Pattern | 0.2 | [`RelevanceScorer::pattern_relevance`] |
//!
//! Recency here is a step function, unlike the continuous half-life decay
//! used for memory items.
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use recall_context::relevance::{context_relevance, KeywordRelevance};
//! use recall_types::{ConversationContext, ConversationMessage};
//!
//! let now = Utc::now();
//! let ctx = ConversationContext::new_at("billing", now)
//!     .with_message(ConversationMessage::user("my invoice shows a double charge"));
//! let score = context_relevance(&KeywordRelevance::default(), "double charge", &ctx, now);
//! assert!(score > 0.6);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use recall_memory::text::{overlap_ratio, significant_tokens};
use recall_types::ConversationContext;

const RECENCY_WEIGHT: f64 = 0.3;
const OVERLAP_WEIGHT: f64 = 0.5;
const PATTERN_WEIGHT: f64 = 0.2;

/// Constant pattern score returned by [`KeywordRelevance`].
pub const DEFAULT_PATTERN_RELEVANCE: f64 = 0.5;

// ─────────────────────────────────────────────────────────────────────────────
// Collaborator traits
// ─────────────────────────────────────────────────────────────────────────────

/// Pluggable key-term extraction and pattern scoring.
pub trait RelevanceScorer: Send + Sync {
    /// The terms of `text` that carry topic signal.
    fn extract_key_terms(&self, text: &str) -> HashSet<String>;

    /// A learned-pattern score in `[0.0, 1.0]` for `input` against `context`.
    fn pattern_relevance(&self, input: &str, context: &ConversationContext) -> f64;
}

/// Tokenizer-based scorer: key terms are significant tokens and the pattern
/// score is a constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeywordRelevance {
    pattern_score: f64,
}

impl KeywordRelevance {
    pub fn new(pattern_score: f64) -> Self {
        Self {
            pattern_score: unit(pattern_score),
        }
    }
}

impl Default for KeywordRelevance {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN_RELEVANCE)
    }
}

impl RelevanceScorer for KeywordRelevance {
    fn extract_key_terms(&self, text: &str) -> HashSet<String> {
        significant_tokens(text)
    }

    fn pattern_relevance(&self, _input: &str, _context: &ConversationContext) -> f64 {
        self.pattern_score
    }
}

/// Maps a topic to the user values it touches. Tags context metadata only.
pub trait ValuesProvider: Send + Sync {
    fn related_values(&self, topic: &str) -> BTreeSet<String>;
}

/// Provider that never tags anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoValues;

impl ValuesProvider for NoValues {
    fn related_values(&self, _topic: &str) -> BTreeSet<String> {
        BTreeSet::new()
    }
}

/// Keyword table provider: a topic is tagged with every value whose keyword
/// list shares a significant token with it.
#[derive(Debug, Clone, Default)]
pub struct KeywordValues {
    table: BTreeMap<String, BTreeSet<String>>,
}

impl KeywordValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` for each of `keywords`.
    pub fn with_value<I, S>(mut self, value: &str, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in keywords {
            self.table
                .entry(keyword.as_ref().to_lowercase())
                .or_default()
                .insert(value.to_string());
        }
        self
    }
}

impl ValuesProvider for KeywordValues {
    fn related_values(&self, topic: &str) -> BTreeSet<String> {
        significant_tokens(topic)
            .iter()
            .filter_map(|token| self.table.get(token))
            .flatten()
            .cloned()
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Scoring
// ─────────────────────────────────────────────────────────────────────────────

/// Stepped recency score for a gap since last activity.
///
/// Negative gaps (clock skew) count as zero.
pub fn recency_score(gap: Duration) -> f64 {
    let gap = gap.max(Duration::zero());
    if gap < Duration::minutes(1) {
        1.0
    } else if gap < Duration::minutes(5) {
        0.9
    } else if gap < Duration::minutes(15) {
        0.8
    } else if gap < Duration::hours(1) {
        0.7
    } else if gap < Duration::days(1) {
        0.5
    } else {
        0.3
    }
}

/// Every key term found in the topic and messages of `context`.
pub fn context_terms(scorer: &dyn RelevanceScorer, context: &ConversationContext) -> HashSet<String> {
    context
        .texts()
        .flat_map(|text| scorer.extract_key_terms(text))
        .collect()
}

/// Relevance of `input` to `context` at `now`.
pub fn context_relevance(
    scorer: &dyn RelevanceScorer,
    input: &str,
    context: &ConversationContext,
    now: DateTime<Utc>,
) -> f64 {
    let terms = scorer.extract_key_terms(input);
    relevance_with_terms(scorer, input, &terms, context, now)
}

/// [`context_relevance`] with the input's key terms already extracted.
pub fn relevance_with_terms(
    scorer: &dyn RelevanceScorer,
    input: &str,
    input_terms: &HashSet<String>,
    context: &ConversationContext,
    now: DateTime<Utc>,
) -> f64 {
    let recency = recency_score(now - context.last_activity());
    let overlap = overlap_ratio(&context_terms(scorer, context), input_terms);
    let pattern = unit(scorer.pattern_relevance(input, context));
    RECENCY_WEIGHT * recency + OVERLAP_WEIGHT * overlap + PATTERN_WEIGHT * pattern
}

fn unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recall_types::ConversationMessage;

    struct FixedPattern(f64);

    impl RelevanceScorer for FixedPattern {
        fn extract_key_terms(&self, text: &str) -> HashSet<String> {
            significant_tokens(text)
        }

        fn pattern_relevance(&self, _input: &str, _context: &ConversationContext) -> f64 {
            self.0
        }
    }

    // ── recency ──────────────────────────────────────────────────────────────

    #[test]
    fn recency_bands() {
        assert_eq!(recency_score(Duration::seconds(0)), 1.0);
        assert_eq!(recency_score(Duration::seconds(59)), 1.0);
        assert_eq!(recency_score(Duration::minutes(1)), 0.9);
        assert_eq!(recency_score(Duration::minutes(10)), 0.8);
        assert_eq!(recency_score(Duration::minutes(30)), 0.7);
        assert_eq!(recency_score(Duration::hours(5)), 0.5);
        assert_eq!(recency_score(Duration::days(3)), 0.3);
    }

    #[test]
    fn negative_gap_is_fresh() {
        assert_eq!(recency_score(Duration::minutes(-5)), 1.0);
    }

    // ── relevance ────────────────────────────────────────────────────────────

    #[test]
    fn full_overlap_fresh_context() {
        let now = Utc::now();
        let ctx = ConversationContext::new_at("billing", now)
            .with_message(ConversationMessage::at(recall_types::Role::User, "invoice double charge", now));
        let score = context_relevance(&KeywordRelevance::default(), "double charge", &ctx, now);
        assert!((score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn no_overlap_scores_recency_and_pattern_only() {
        let now = Utc::now();
        let ctx = ConversationContext::new_at("gardening tomatoes", now);
        let score = context_relevance(&KeywordRelevance::default(), "quarterly taxes", &ctx, now);
        assert!((score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn pattern_score_is_clamped() {
        let now = Utc::now();
        let ctx = ConversationContext::new_at("gardening", now);
        let high = context_relevance(&FixedPattern(7.0), "weather", &ctx, now);
        let nan = context_relevance(&FixedPattern(f64::NAN), "weather", &ctx, now);
        assert!((high - 0.5).abs() < 1e-9);
        assert!((nan - 0.3).abs() < 1e-9);
    }

    #[test]
    fn stale_context_scores_lower() {
        let now = Utc::now();
        let ctx = ConversationContext::new_at("billing invoice", now - Duration::days(2));
        let fresh = ConversationContext::new_at("billing invoice", now);
        let scorer = KeywordRelevance::default();
        assert!(context_relevance(&scorer, "invoice", &ctx, now) < context_relevance(&scorer, "invoice", &fresh, now));
    }

    // ── values ───────────────────────────────────────────────────────────────

    #[test]
    fn keyword_values_tag_matching_topics() {
        let values = KeywordValues::new()
            .with_value("family", ["kids", "birthday"])
            .with_value("health", ["running", "sleep"]);
        let tags = values.related_values("Planning birthday party");
        assert_eq!(tags, BTreeSet::from(["family".to_string()]));
        assert!(values.related_values("quarterly taxes").is_empty());
        assert!(NoValues.related_values("birthday").is_empty());
    }
}
