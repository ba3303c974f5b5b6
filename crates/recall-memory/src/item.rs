//! Memory items and the effective-score model.
//!
//! ```text
//! effective = priority × decay(age) × freshness × personality × learning_weight
//!
//! decay(age)   = 0.5 ^ (age / 7 days)
//! freshness    = 1.15 if last access < 6 h ago, else 1.0
//! personality  = 1 + 0.5 × personal_relevance
//! ```
//!
//! Age is measured from the item's creation time. The decay is a continuous
//! half-life curve; the context router's recency bands are a separate,
//! stepped model and are not derived from this one.

use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::text::significant_tokens;

/// Half-life of the priority decay, in seconds (7 days).
pub const HALF_LIFE_SECS: f64 = 7.0 * 86_400.0;
/// Items accessed more recently than this get [`FRESHNESS_BOOST`].
pub const FRESHNESS_WINDOW_HOURS: i64 = 6;
pub const FRESHNESS_BOOST: f64 = 1.15;

pub const MIN_PRIORITY: f64 = 0.0;
pub const MAX_PRIORITY: f64 = 100.0;
pub const MIN_LEARNING_WEIGHT: f64 = 0.1;
pub const MAX_LEARNING_WEIGHT: f64 = 2.0;

/// Exponential half-life decay for an item of the given age.
///
/// Negative ages (clock skew) are treated as zero, so the result is always in
/// `(0, 1]`.
pub fn decay(age: Duration) -> f64 {
    let secs = age.num_milliseconds().max(0) as f64 / 1000.0;
    0.5f64.powf(secs / HALF_LIFE_SECS)
}

/// A single stored memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub key: String,
    pub value: String,
    /// Externally assigned importance in `[0, 100]`.
    pub priority: f64,
    pub category: String,
    pub emotional_context: String,
    /// How personally relevant the item is to the user, in `[0, 1]`.
    pub personal_relevance: f64,
    /// Reinforcement multiplier in `[0.1, 2.0]`.
    pub learning_weight: f64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Keys of semantically adjacent items. Weak: a key may outlive its item.
    #[serde(default)]
    pub related: BTreeSet<String>,
}

impl MemoryItem {
    /// Build a new item created (and last accessed) at `now`.
    ///
    /// Priority and relevance are clamped into their valid ranges.
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        priority: f64,
        category: impl Into<String>,
        emotional_context: impl Into<String>,
        personal_relevance: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            priority: clamp_priority(priority),
            category: category.into(),
            emotional_context: emotional_context.into(),
            personal_relevance: clamp_unit(personal_relevance),
            learning_weight: 1.0,
            created_at: now,
            last_accessed: now,
            related: BTreeSet::new(),
        }
    }

    /// The composite score used for retrieval ordering and eviction.
    pub fn effective_score_at(&self, now: DateTime<Utc>) -> f64 {
        let freshness = if now - self.last_accessed < Duration::hours(FRESHNESS_WINDOW_HOURS) {
            FRESHNESS_BOOST
        } else {
            1.0
        };
        let personality = 1.0 + 0.5 * self.personal_relevance;
        self.priority * decay(now - self.created_at) * freshness * personality * self.learning_weight
    }

    /// [`effective_score_at`][Self::effective_score_at] evaluated now.
    pub fn effective_score(&self) -> f64 {
        self.effective_score_at(Utc::now())
    }

    /// Significant tokens of the key and value together.
    pub fn tokens(&self) -> HashSet<String> {
        significant_tokens(&format!("{} {}", self.key, self.value))
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_accessed {
            self.last_accessed = now;
        }
    }
}

pub(crate) fn clamp_priority(priority: f64) -> f64 {
    if priority.is_nan() {
        return MIN_PRIORITY;
    }
    priority.clamp(MIN_PRIORITY, MAX_PRIORITY)
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
