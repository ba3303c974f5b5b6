//! Capacity-bounded, decay-weighted memory store.
//!
//! [`MemoryStore`] keeps exactly one [`MemoryItem`] per key, links items that
//! share at least two significant tokens into an undirected adjacency graph,
//! and evicts by effective score (not FIFO, not LRU) whenever the number of
//! items exceeds [`MemoryConfig::max_items`].
//!
//! Every public operation has a wall-clock variant and an `_at` variant taking
//! an explicit `now`, which keeps the decay math reproducible in tests.
//!
//! # Example
//!
//! ```rust
//! use recall_memory::store::{MemoryConfig, MemoryStore};
//!
//! let mut store = MemoryStore::new(MemoryConfig::default());
//! store
//!     .remember("coffee", "prefers strong black coffee", 70.0, "preference", "", 0.8)
//!     .unwrap();
//!
//! assert_eq!(store.recall("coffee").as_deref(), Some("prefers strong black coffee"));
//! assert!(store.recall("tea").is_none());
//! ```

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use recall_types::RecallError;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::item::{MAX_LEARNING_WEIGHT, MIN_LEARNING_WEIGHT, MemoryItem, clamp_priority, clamp_unit};
use crate::text::{common_count, overlap_ratio, significant_tokens, words};

/// Minimum shared significant tokens for two items to become adjacent.
pub const ADJACENCY_MIN_SHARED: usize = 2;

/// Conversation turns with fewer significant tokens are not worth storing.
pub const MIN_SIGNIFICANT_TOKENS: usize = 3;

/// Words that mark a turn as a preference or commitment worth remembering.
const SIGNIFICANCE_MARKERS: &[&str] = &[
    "prefer", "like", "love", "hate", "always", "never", "remember", "important", "birthday",
];

// Weights of the contextual recall blend.
const QUERY_WEIGHT: f64 = 2.0;
const CONTEXT_WEIGHT: f64 = 1.0;
const SCORE_WEIGHT: f64 = 0.01;
const DEGREE_WEIGHT: f64 = 0.1;

// ─────────────────────────────────────────────────────────────────────────────
// MemoryConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity and retention knobs for a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Eviction starts when the store holds more than this many items.
    pub max_items: usize,
    /// Eviction stops once the store is down to this many items. Capped at
    /// `max_items` and never below one.
    pub prune_target: usize,
    /// Length of the append-only history ring buffer.
    pub history_limit: usize,
    /// [`MemoryStore::prune_aged`] drops items scoring below this floor.
    pub prune_score_floor: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_items: 1000,
            prune_target: 800,
            history_limit: 10_000,
            prune_score_floor: 1.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryStore
// ─────────────────────────────────────────────────────────────────────────────

/// Session-scoped memory cache with semantic cross-linking.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    config: MemoryConfig,
    items: HashMap<String, MemoryItem>,
    /// Cached significant tokens of each item's key + value.
    tokens: HashMap<String, HashSet<String>>,
    /// Copies of every written version, oldest first.
    history: VecDeque<MemoryItem>,
}

impl MemoryStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            items: HashMap::new(),
            tokens: HashMap::new(),
            history: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look at an item without touching its last-access time.
    pub fn get(&self, key: &str) -> Option<&MemoryItem> {
        self.items.get(key)
    }

    /// Snapshot of every stored item, sorted by key.
    pub fn items(&self) -> Vec<MemoryItem> {
        let mut items: Vec<MemoryItem> = self.items.values().cloned().collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));
        items
    }

    /// The history log, oldest write first.
    pub fn history(&self) -> impl Iterator<Item = &MemoryItem> {
        self.history.iter()
    }

    // ── writes ──────────────────────────────────────────────────────────────

    /// Insert or update the item stored under `key`.
    pub fn remember(
        &mut self,
        key: &str,
        value: &str,
        priority: f64,
        category: &str,
        emotional_context: &str,
        personal_relevance: f64,
    ) -> Result<(), RecallError> {
        self.remember_at(key, value, priority, category, emotional_context, personal_relevance, Utc::now())
    }

    /// [`remember`][Self::remember] with an explicit clock.
    ///
    /// On insert the new item is linked to every existing item it shares at
    /// least [`ADJACENCY_MIN_SHARED`] significant tokens with. Capacity is
    /// enforced before returning; an `Err` means the eviction invariant was
    /// broken, which correct operation never does.
    #[allow(clippy::too_many_arguments)]
    pub fn remember_at(
        &mut self,
        key: &str,
        value: &str,
        priority: f64,
        category: &str,
        emotional_context: &str,
        personal_relevance: f64,
        now: DateTime<Utc>,
    ) -> Result<(), RecallError> {
        if let Some(item) = self.items.get_mut(key) {
            item.value = value.to_string();
            item.priority = clamp_priority(priority);
            item.category = category.to_string();
            item.emotional_context = emotional_context.to_string();
            item.personal_relevance = clamp_unit(personal_relevance);
            item.touch(now);
            let snapshot = item.clone();
            self.tokens.insert(key.to_string(), snapshot.tokens());
            self.push_history(snapshot);
            debug!(key, "memory updated");
        } else {
            let mut item = MemoryItem::new(
                key,
                value,
                priority,
                category,
                emotional_context,
                personal_relevance,
                now,
            );
            let tokens = item.tokens();
            let neighbours: Vec<String> = self
                .tokens
                .iter()
                .filter(|(_, other)| common_count(&tokens, other) >= ADJACENCY_MIN_SHARED)
                .map(|(k, _)| k.clone())
                .collect();
            for neighbour in &neighbours {
                if let Some(other) = self.items.get_mut(neighbour) {
                    other.related.insert(key.to_string());
                }
                item.related.insert(neighbour.clone());
            }
            debug!(key, links = neighbours.len(), "memory stored");
            self.tokens.insert(key.to_string(), tokens);
            self.push_history(item.clone());
            self.items.insert(key.to_string(), item);
        }
        self.enforce_capacity(now)
    }

    /// Store a conversation turn only if it carries enough signal.
    ///
    /// A turn needs at least [`MIN_SIGNIFICANT_TOKENS`] significant tokens.
    /// Its priority grows with the token count and gets a bump when it
    /// mentions a preference or commitment. Returns whether it was stored.
    pub fn record_if_significant(
        &mut self,
        key: &str,
        content: &str,
        category: &str,
        emotional_context: &str,
        personal_relevance: f64,
    ) -> Result<bool, RecallError> {
        self.record_if_significant_at(key, content, category, emotional_context, personal_relevance, Utc::now())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn record_if_significant_at(
        &mut self,
        key: &str,
        content: &str,
        category: &str,
        emotional_context: &str,
        personal_relevance: f64,
        now: DateTime<Utc>,
    ) -> Result<bool, RecallError> {
        let significant = significant_tokens(content).len();
        if significant < MIN_SIGNIFICANT_TOKENS {
            debug!(key, significant, "turn below significance threshold");
            return Ok(false);
        }
        let marked = words(content)
            .iter()
            .any(|w| SIGNIFICANCE_MARKERS.contains(&w.as_str()));
        let priority = (20.0 + 5.0 * significant as f64 + if marked { 25.0 } else { 0.0 }).min(100.0);
        self.remember_at(key, content, priority, category, emotional_context, personal_relevance, now)?;
        Ok(true)
    }

    /// Blend `effectiveness` into the item's learning weight.
    ///
    /// `new = clamp(old × 0.9 + effectiveness × 0.1, 0.1, 2.0)`. Returns
    /// `false` for unknown keys.
    pub fn reinforce_memory(&mut self, key: &str, effectiveness: f64) -> bool {
        let Some(item) = self.items.get_mut(key) else {
            return false;
        };
        let effectiveness = clamp_unit(effectiveness);
        item.learning_weight =
            (item.learning_weight * 0.9 + effectiveness * 0.1).clamp(MIN_LEARNING_WEIGHT, MAX_LEARNING_WEIGHT);
        debug!(key, weight = item.learning_weight, "memory reinforced");
        true
    }

    /// Drop every item whose effective score has decayed below
    /// [`MemoryConfig::prune_score_floor`]. Returns the number removed.
    pub fn prune_aged(&mut self) -> usize {
        self.prune_aged_at(Utc::now())
    }

    pub fn prune_aged_at(&mut self, now: DateTime<Utc>) -> usize {
        let floor = self.config.prune_score_floor;
        let stale: Vec<String> = self
            .items
            .values()
            .filter(|item| item.effective_score_at(now) < floor)
            .map(|item| item.key.clone())
            .collect();
        for key in &stale {
            self.remove(key);
        }
        if !stale.is_empty() {
            info!(removed = stale.len(), remaining = self.items.len(), "aged memories pruned");
        }
        stale.len()
    }

    /// Replace the whole store content (snapshot restore).
    ///
    /// Adjacency keys pointing at items absent from `items` are dropped and
    /// capacity is enforced afterwards.
    pub fn restore(&mut self, items: Vec<MemoryItem>) -> Result<(), RecallError> {
        self.items.clear();
        self.tokens.clear();
        for item in items {
            self.tokens.insert(item.key.clone(), item.tokens());
            self.items.insert(item.key.clone(), item);
        }
        let known: HashSet<String> = self.items.keys().cloned().collect();
        for item in self.items.values_mut() {
            item.related.retain(|k| known.contains(k) && *k != item.key);
        }
        self.enforce_capacity(Utc::now())
    }

    // ── reads ───────────────────────────────────────────────────────────────

    /// Return the value under `key` and refresh its last-access time.
    pub fn recall(&mut self, key: &str) -> Option<String> {
        self.recall_at(key, Utc::now())
    }

    pub fn recall_at(&mut self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let item = self.items.get_mut(key)?;
        item.touch(now);
        Some(item.value.clone())
    }

    /// Rank every item against a query and a surrounding context text.
    ///
    /// ```text
    /// score = 2.0 × overlap(query) + 1.0 × overlap(context)
    ///       + 0.01 × effective / max_effective + 0.1 × degree / max_degree
    /// ```
    ///
    /// This read has a side effect: the returned items get their last-access
    /// time refreshed, so they also receive the freshness boost afterwards.
    pub fn contextual_recall(&mut self, query: &str, context: &str, limit: usize) -> Vec<MemoryItem> {
        self.contextual_recall_at(query, context, limit, Utc::now())
    }

    pub fn contextual_recall_at(
        &mut self,
        query: &str,
        context: &str,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<MemoryItem> {
        if limit == 0 || self.items.is_empty() {
            return Vec::new();
        }
        let query_terms = significant_tokens(query);
        let context_terms = significant_tokens(context);

        let effective: HashMap<&str, f64> = self
            .items
            .values()
            .map(|item| (item.key.as_str(), item.effective_score_at(now)))
            .collect();
        let max_score = effective.values().copied().fold(0.0, f64::max);
        let max_degree = self.items.values().map(|i| i.related.len()).max().unwrap_or(0);

        let mut ranked: Vec<(String, f64)> = self
            .items
            .values()
            .map(|item| {
                let tokens = self.tokens.get(&item.key);
                let empty = HashSet::new();
                let tokens = tokens.unwrap_or(&empty);
                let score_part = if max_score > 0.0 { effective[item.key.as_str()] / max_score } else { 0.0 };
                let degree_part = if max_degree > 0 {
                    item.related.len() as f64 / max_degree as f64
                } else {
                    0.0
                };
                let score = QUERY_WEIGHT * overlap_ratio(tokens, &query_terms)
                    + CONTEXT_WEIGHT * overlap_ratio(tokens, &context_terms)
                    + SCORE_WEIGHT * score_part
                    + DEGREE_WEIGHT * degree_part;
                (item.key.clone(), score)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);

        ranked
            .into_iter()
            .filter_map(|(key, _)| {
                let item = self.items.get_mut(&key)?;
                item.touch(now);
                Some(item.clone())
            })
            .collect()
    }

    /// Items reachable from `key` within `depth` adjacency hops.
    ///
    /// The seed itself and duplicates are excluded, dangling keys are
    /// skipped, and the result is sorted by effective score (highest first).
    pub fn find_related_memories(&self, key: &str, depth: usize) -> Vec<MemoryItem> {
        self.find_related_memories_at(key, depth, Utc::now())
    }

    pub fn find_related_memories_at(&self, key: &str, depth: usize, now: DateTime<Utc>) -> Vec<MemoryItem> {
        if !self.items.contains_key(key) {
            return Vec::new();
        }
        let mut visited: HashSet<&str> = HashSet::from([key]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(key, 0)]);
        let mut found: Vec<&MemoryItem> = Vec::new();

        while let Some((current, hops)) = queue.pop_front() {
            if hops >= depth {
                continue;
            }
            let Some(item) = self.items.get(current) else {
                continue;
            };
            for neighbour in &item.related {
                let Some(next) = self.items.get(neighbour.as_str()) else {
                    continue;
                };
                if visited.insert(next.key.as_str()) {
                    found.push(next);
                    queue.push_back((next.key.as_str(), hops + 1));
                }
            }
        }
        sort_by_score(found, now)
    }

    /// The `limit` highest-scoring items.
    pub fn top_memories(&self, limit: usize) -> Vec<MemoryItem> {
        self.top_memories_at(limit, Utc::now())
    }

    pub fn top_memories_at(&self, limit: usize, now: DateTime<Utc>) -> Vec<MemoryItem> {
        let mut items = sort_by_score(self.items.values().collect(), now);
        items.truncate(limit);
        items
    }

    /// Distinct categories in use, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .items
            .values()
            .map(|i| i.category.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        categories.sort();
        categories
    }

    /// Items filed under `category`, highest score first.
    pub fn memories_in_category(&self, category: &str) -> Vec<MemoryItem> {
        self.memories_in_category_at(category, Utc::now())
    }

    pub fn memories_in_category_at(&self, category: &str, now: DateTime<Utc>) -> Vec<MemoryItem> {
        let items = self.items.values().filter(|i| i.category == category).collect();
        sort_by_score(items, now)
    }

    // ── internals ───────────────────────────────────────────────────────────

    /// Evict lowest-scoring items until the store is back at `prune_target`.
    ///
    /// Ties are broken by older last access first, then by key, so the victim
    /// set is deterministic.
    fn enforce_capacity(&mut self, now: DateTime<Utc>) -> Result<(), RecallError> {
        let max = self.config.max_items;
        if self.items.len() <= max {
            return Ok(());
        }
        // At least one item survives so the top scorer is never evicted.
        let target = self.config.prune_target.min(max).max(max.min(1));
        let mut ranked: Vec<(String, f64, DateTime<Utc>)> = self
            .items
            .values()
            .map(|i| (i.key.clone(), i.effective_score_at(now), i.last_accessed))
            .collect();
        ranked.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| a.2.cmp(&b.2))
                .then_with(|| a.0.cmp(&b.0))
        });
        let excess = self.items.len() - target;
        for (key, _, _) in ranked.into_iter().take(excess) {
            self.remove(&key);
        }
        info!(evicted = excess, remaining = self.items.len(), "memory capacity enforced");

        if self.items.len() > max {
            error!(len = self.items.len(), max, "eviction left the store above capacity");
            return Err(RecallError::CapacityViolation {
                len: self.items.len(),
                max,
            });
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Option<MemoryItem> {
        let item = self.items.remove(key)?;
        self.tokens.remove(key);
        for neighbour in &item.related {
            if let Some(other) = self.items.get_mut(neighbour) {
                other.related.remove(key);
            }
        }
        Some(item)
    }

    fn push_history(&mut self, item: MemoryItem) {
        if self.config.history_limit == 0 {
            return;
        }
        while self.history.len() >= self.config.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(item);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

fn sort_by_score(items: Vec<&MemoryItem>, now: DateTime<Utc>) -> Vec<MemoryItem> {
    let mut scored: Vec<(f64, &MemoryItem)> = items
        .into_iter()
        .map(|i| (i.effective_score_at(now), i))
        .collect();
    scored.sort_by(|a, b| match b.0.total_cmp(&a.0) {
        Ordering::Equal => a.1.key.cmp(&b.1.key),
        other => other,
    });
    scored.into_iter().map(|(_, i)| i.clone()).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn small_store(max_items: usize, prune_target: usize) -> MemoryStore {
        MemoryStore::new(MemoryConfig {
            max_items,
            prune_target,
            ..MemoryConfig::default()
        })
    }

    fn put(store: &mut MemoryStore, key: &str, value: &str, priority: f64, now: DateTime<Utc>) {
        store.remember_at(key, value, priority, "general", "", 0.0, now).unwrap();
    }

    // ── remember / recall ────────────────────────────────────────────────────

    #[test]
    fn remember_then_recall() {
        let mut store = MemoryStore::default();
        store.remember("k", "v", 50.0, "c", "calm", 0.5).unwrap();
        assert_eq!(store.recall("k").as_deref(), Some("v"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn remember_same_key_updates_in_place() {
        let t0 = Utc::now();
        let mut store = MemoryStore::default();
        store.remember_at("k", "old", 10.0, "a", "", 0.1, t0).unwrap();
        let later = t0 + Duration::minutes(5);
        store.remember_at("k", "new", 300.0, "b", "joy", 2.0, later).unwrap();

        assert_eq!(store.len(), 1);
        let item = store.get("k").unwrap();
        assert_eq!(item.value, "new");
        assert_eq!(item.priority, 100.0);
        assert_eq!(item.category, "b");
        assert_eq!(item.personal_relevance, 1.0);
        assert_eq!(item.created_at, t0);
        assert_eq!(item.last_accessed, later);
    }

    #[test]
    fn history_keeps_every_written_version() {
        let mut store = MemoryStore::default();
        store.remember("k", "one", 10.0, "c", "", 0.0).unwrap();
        store.remember("k", "two", 10.0, "c", "", 0.0).unwrap();
        let values: Vec<&str> = store.history().map(|i| i.value.as_str()).collect();
        assert_eq!(values, vec!["one", "two"]);
    }

    #[test]
    fn history_is_bounded() {
        let mut store = MemoryStore::new(MemoryConfig {
            history_limit: 3,
            ..MemoryConfig::default()
        });
        for i in 0..5 {
            store.remember("k", &format!("v{i}"), 10.0, "c", "", 0.0).unwrap();
        }
        let values: Vec<&str> = store.history().map(|i| i.value.as_str()).collect();
        assert_eq!(values, vec!["v2", "v3", "v4"]);
    }

    #[test]
    fn recall_unknown_key_is_none() {
        let mut store = MemoryStore::default();
        assert!(store.recall("missing").is_none());
    }

    #[test]
    fn recall_refreshes_last_access() {
        let t0 = Utc::now();
        let mut store = MemoryStore::default();
        put(&mut store, "k", "v", 10.0, t0);
        let later = t0 + Duration::hours(3);
        store.recall_at("k", later);
        assert_eq!(store.get("k").unwrap().last_accessed, later);
    }

    // ── adjacency ────────────────────────────────────────────────────────────

    #[test]
    fn items_sharing_two_tokens_are_linked_both_ways() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        put(&mut store, "a", "paris trip planning", 10.0, now);
        put(&mut store, "b", "planning the paris museum visit", 10.0, now);
        assert!(store.get("a").unwrap().related.contains("b"));
        assert!(store.get("b").unwrap().related.contains("a"));
    }

    #[test]
    fn one_shared_token_is_not_enough() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        put(&mut store, "a", "paris trip", 10.0, now);
        put(&mut store, "b", "paris weather forecast", 10.0, now);
        assert!(store.get("a").unwrap().related.is_empty());
        assert!(store.get("b").unwrap().related.is_empty());
    }

    #[test]
    fn eviction_scrubs_neighbour_links() {
        let now = Utc::now();
        let mut store = small_store(2, 1);
        put(&mut store, "low", "garden tomato harvest", 1.0, now);
        put(&mut store, "high", "garden tomato seedlings", 90.0, now);
        assert!(store.get("high").unwrap().related.contains("low"));
        put(&mut store, "other", "unrelated sentence entirely", 50.0, now);
        assert!(store.get("low").is_none());
        assert!(store.get("high").unwrap().related.is_empty());
    }

    // ── contextual recall ────────────────────────────────────────────────────

    #[test]
    fn contextual_recall_prefers_query_match() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        put(&mut store, "coffee", "likes strong black coffee", 10.0, now);
        put(&mut store, "dog", "walks the dog every morning", 90.0, now);
        let results = store.contextual_recall_at("what coffee should I make", "", 1, now);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].key, "coffee");
    }

    #[test]
    fn contextual_recall_uses_context_terms() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        put(&mut store, "trip", "flight booked to lisbon", 10.0, now);
        put(&mut store, "cake", "chocolate cake recipe", 10.0, now);
        let results = store.contextual_recall_at("anything else?", "planning lisbon flight", 1, now);
        assert_eq!(results[0].key, "trip");
    }

    #[test]
    fn contextual_recall_respects_limit_and_order() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        for i in 0..5 {
            put(&mut store, &format!("k{i}"), &format!("value number {i}"), 10.0 * i as f64, now);
        }
        let results = store.contextual_recall_at("", "", 3, now);
        let keys: Vec<&str> = results.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, vec!["k4", "k3", "k2"]);
    }

    #[test]
    fn contextual_recall_touches_returned_items_only() {
        let t0 = Utc::now();
        let mut store = MemoryStore::default();
        put(&mut store, "coffee", "likes strong black coffee", 10.0, t0);
        put(&mut store, "dog", "walks the dog every morning", 10.0, t0);
        let later = t0 + Duration::hours(12);
        let results = store.contextual_recall_at("coffee", "", 1, later);
        assert_eq!(results[0].last_accessed, later);
        assert_eq!(store.get("coffee").unwrap().last_accessed, later);
        assert_eq!(store.get("dog").unwrap().last_accessed, t0);
    }

    #[test]
    fn contextual_recall_on_empty_store_is_empty() {
        let mut store = MemoryStore::default();
        assert!(store.contextual_recall("x", "y", 5).is_empty());
    }

    // ── reinforcement ────────────────────────────────────────────────────────

    #[test]
    fn reinforce_blends_learning_weight() {
        let mut store = MemoryStore::default();
        store.remember("k", "v", 10.0, "c", "", 0.0).unwrap();
        assert!(store.reinforce_memory("k", 1.0));
        let weight = store.get("k").unwrap().learning_weight;
        assert!((weight - 1.0).abs() < 1e-12);

        store.reinforce_memory("k", 0.0);
        let weight = store.get("k").unwrap().learning_weight;
        assert!((weight - 0.9).abs() < 1e-12);
    }

    #[test]
    fn reinforce_never_drops_below_floor() {
        let mut store = MemoryStore::default();
        store.remember("k", "v", 10.0, "c", "", 0.0).unwrap();
        for _ in 0..200 {
            store.reinforce_memory("k", 0.0);
        }
        assert!((store.get("k").unwrap().learning_weight - MIN_LEARNING_WEIGHT).abs() < 1e-12);
    }

    #[test]
    fn reinforce_unknown_key_returns_false() {
        let mut store = MemoryStore::default();
        assert!(!store.reinforce_memory("nope", 1.0));
    }

    // ── capacity ─────────────────────────────────────────────────────────────

    #[test]
    fn eviction_is_score_weighted_not_fifo() {
        let now = Utc::now();
        let mut store = small_store(3, 2);
        put(&mut store, "first-high", "alpha", 90.0, now);
        put(&mut store, "second-low", "beta", 5.0, now);
        put(&mut store, "third-mid", "gamma", 50.0, now);
        put(&mut store, "fourth-mid", "delta", 40.0, now);
        assert_eq!(store.len(), 2);
        assert!(store.get("first-high").is_some());
        assert!(store.get("third-mid").is_some());
        assert!(store.get("second-low").is_none());
    }

    #[test]
    fn stale_item_loses_to_recent_one_of_equal_priority() {
        let t0 = Utc::now();
        let mut store = small_store(1, 1);
        put(&mut store, "old", "alpha", 50.0, t0);
        put(&mut store, "new", "beta", 50.0, t0 + Duration::days(10));
        assert!(store.get("old").is_none());
        assert!(store.get("new").is_some());
    }

    #[test]
    fn capacity_holds_after_every_remember() {
        let now = Utc::now();
        let mut store = small_store(10, 7);
        for i in 0..100 {
            put(&mut store, &format!("k{i}"), "v", (i % 17) as f64, now + Duration::seconds(i));
            assert!(store.len() <= 10);
        }
    }

    #[test]
    fn prune_target_above_max_is_capped() {
        let now = Utc::now();
        let mut store = small_store(2, 50);
        for i in 0..5 {
            put(&mut store, &format!("k{i}"), "v", 10.0, now);
        }
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn zero_prune_target_keeps_the_top_scorer() {
        let now = Utc::now();
        let mut store = small_store(2, 0);
        put(&mut store, "low", "v", 10.0, now);
        put(&mut store, "top", "v", 90.0, now);
        put(&mut store, "mid", "v", 40.0, now);
        assert_eq!(store.len(), 1);
        assert_eq!(store.recall_at("top", now).as_deref(), Some("v"));
    }

    // ── related memories ─────────────────────────────────────────────────────

    #[test]
    fn related_memories_respect_depth() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        put(&mut store, "a", "apple banana", 10.0, now);
        put(&mut store, "b", "apple banana cherry grape", 10.0, now);
        put(&mut store, "c", "cherry grape melon", 10.0, now);
        let one_hop: Vec<String> = store.find_related_memories_at("a", 1, now).into_iter().map(|i| i.key).collect();
        assert_eq!(one_hop, vec!["b"]);
        let two_hops = store.find_related_memories_at("a", 2, now);
        assert_eq!(two_hops.len(), 2);
    }

    #[test]
    fn related_memories_of_unknown_key_is_empty() {
        let store = MemoryStore::default();
        assert!(store.find_related_memories("ghost", 3).is_empty());
    }

    #[test]
    fn related_memories_depth_zero_is_empty() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        put(&mut store, "a", "apple banana", 10.0, now);
        put(&mut store, "b", "apple banana", 10.0, now);
        assert!(store.find_related_memories_at("a", 0, now).is_empty());
    }

    // ── administrative ───────────────────────────────────────────────────────

    #[test]
    fn top_memories_orders_by_score() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        put(&mut store, "low", "v", 1.0, now);
        put(&mut store, "high", "v", 99.0, now);
        put(&mut store, "mid", "v", 50.0, now);
        let keys: Vec<String> = store.top_memories_at(2, now).into_iter().map(|i| i.key).collect();
        assert_eq!(keys, vec!["high", "mid"]);
    }

    #[test]
    fn prune_aged_drops_decayed_items() {
        let t0 = Utc::now();
        let mut store = MemoryStore::default();
        put(&mut store, "faint", "v", 4.0, t0);
        put(&mut store, "strong", "v", 100.0, t0);
        // 4 × 0.5^4 = 0.25, below the default floor of 1.0.
        let removed = store.prune_aged_at(t0 + Duration::days(28));
        assert_eq!(removed, 1);
        assert!(store.get("faint").is_none());
        assert!(store.get("strong").is_some());
    }

    #[test]
    fn categories_and_category_listing() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        store.remember_at("a", "v", 10.0, "work", "", 0.0, now).unwrap();
        store.remember_at("b", "v", 20.0, "home", "", 0.0, now).unwrap();
        store.remember_at("c", "v", 30.0, "work", "", 0.0, now).unwrap();
        assert_eq!(store.categories(), vec!["home", "work"]);
        let keys: Vec<String> = store
            .memories_in_category_at("work", now)
            .into_iter()
            .map(|i| i.key)
            .collect();
        assert_eq!(keys, vec!["c", "a"]);
    }

    // ── significance ─────────────────────────────────────────────────────────

    #[test]
    fn short_turns_are_not_recorded() {
        let mut store = MemoryStore::default();
        let stored = store.record_if_significant("t1", "ok thanks", "conversation", "", 0.0).unwrap();
        assert!(!stored);
        assert!(store.is_empty());
    }

    #[test]
    fn marked_turns_get_higher_priority() {
        let now = Utc::now();
        let mut store = MemoryStore::default();
        store
            .record_if_significant_at("plain", "booked flights towards lisbon today", "c", "", 0.0, now)
            .unwrap();
        store
            .record_if_significant_at("marked", "always prefer window seats on flights", "c", "", 0.0, now)
            .unwrap();
        assert!(store.get("marked").unwrap().priority > store.get("plain").unwrap().priority);
    }

    // ── restore ──────────────────────────────────────────────────────────────

    #[test]
    fn restore_drops_dangling_links() {
        let now = Utc::now();
        let mut item = MemoryItem::new("a", "v", 10.0, "c", "", 0.0, now);
        item.related.insert("ghost".to_string());
        let mut store = MemoryStore::default();
        store.restore(vec![item]).unwrap();
        assert!(store.get("a").unwrap().related.is_empty());
    }
}
