//! Personalization profile.
//!
//! A read-mostly aggregate fed by every stored memory and every conversation
//! turn. It tallies task types by keyword, extracts preference weights from
//! phrases such as "I prefer …" / "I hate …", scores communication style by
//! simple tone heuristics and counts emotional tags.
//!
//! Each map is capped at [`PersonalizationProfile::max_entries`]; when a map
//! overflows, the entry with the smallest magnitude is dropped.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::MemoryItem;
use crate::text::{MAX_INSIGNIFICANT_LEN, words};

/// Default cap on the number of entries per profile map.
pub const DEFAULT_MAX_ENTRIES: usize = 256;

const TASK_KEYWORDS: &[(&str, &[&str])] = &[
    ("scheduling", &["schedule", "meeting", "calendar", "appointment", "tomorrow"]),
    ("finance", &["billing", "invoice", "payment", "budget", "price", "bank"]),
    ("technical", &["code", "error", "install", "computer", "software", "debug"]),
    ("reminder", &["remind", "reminder", "remember", "forget"]),
    ("writing", &["write", "draft", "email", "letter"]),
    ("health", &["sleep", "exercise", "doctor", "health", "medicine"]),
];

const POSITIVE_VERBS: &[&str] = &["prefer", "like", "love", "enjoy"];
const NEGATIVE_VERBS: &[&str] = &["hate", "dislike", "detest"];
const NEGATIONS: &[&str] = &["dont", "not", "never", "didnt", "doesnt"];
const FILLER: &[&str] = &["that", "this", "when", "with", "very", "much", "more", "some", "having"];

const EMOTION_KEYWORDS: &[(&str, &[&str])] = &[
    ("joy", &["happy", "great", "glad", "excited", "wonderful"]),
    ("sadness", &["sad", "upset", "down", "lonely", "miss"]),
    ("frustration", &["angry", "annoyed", "frustrated", "furious"]),
    ("anxiety", &["worried", "anxious", "nervous", "stressed", "scared"]),
];

/// Aggregated per-session personalization state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalizationProfile {
    pub preferences: BTreeMap<String, f64>,
    pub communication_styles: BTreeMap<String, f64>,
    pub task_types: BTreeMap<String, u64>,
    pub emotional_patterns: BTreeMap<String, f64>,
    pub last_updated: DateTime<Utc>,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Default for PersonalizationProfile {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }
}

impl PersonalizationProfile {
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            preferences: BTreeMap::new(),
            communication_styles: BTreeMap::new(),
            task_types: BTreeMap::new(),
            emotional_patterns: BTreeMap::new(),
            last_updated: Utc::now(),
            max_entries,
        }
    }

    /// Fold a stored memory into the profile.
    pub fn observe_memory(&mut self, item: &MemoryItem) {
        let text = format!("{} {}", item.key, item.value);
        self.tally_tasks(&text);
        self.extract_preferences(&text);
        if !item.emotional_context.is_empty() {
            self.observe_emotion(&item.emotional_context);
        }
        self.touch();
    }

    /// Fold a user turn into the profile.
    pub fn observe_turn(&mut self, text: &str) {
        self.tally_tasks(text);
        self.extract_preferences(text);
        self.score_style(text);
        if let Some(emotion) = detect_emotion(text) {
            self.observe_emotion(emotion);
        }
        self.touch();
    }

    /// Count one occurrence of an emotional tag.
    pub fn observe_emotion(&mut self, tag: &str) {
        *self.emotional_patterns.entry(tag.to_lowercase()).or_insert(0.0) += 1.0;
        let max = self.max_entries;
        cap_map(&mut self.emotional_patterns, max, |v| v.abs());
    }

    /// How personally relevant `text` looks, in `[0, 1]`.
    ///
    /// Every positively weighted preference mentioned in the text adds `0.5`.
    pub fn personal_relevance(&self, text: &str) -> f64 {
        let mentioned = words(text)
            .into_iter()
            .filter(|w| self.preferences.get(w).is_some_and(|weight| *weight > 0.0))
            .collect::<std::collections::HashSet<_>>()
            .len();
        (mentioned as f64 * 0.5).min(1.0)
    }

    /// Preferences ordered by weight, strongest first.
    pub fn top_preferences(&self, n: usize) -> Vec<(String, f64)> {
        let mut prefs: Vec<(String, f64)> = self.preferences.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prefs.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        prefs.truncate(n);
        prefs
    }

    /// The highest-scoring communication style, if any was observed.
    pub fn dominant_style(&self) -> Option<&str> {
        self.communication_styles
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(k, _)| k.as_str())
    }

    /// The most frequent task type, if any.
    pub fn dominant_task(&self) -> Option<&str> {
        self.task_types
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(k, _)| k.as_str())
    }

    /// Owned copy for persistence.
    pub fn export(&self) -> PersonalizationProfile {
        self.clone()
    }

    /// Replace this profile with a previously exported one.
    pub fn import(&mut self, snapshot: PersonalizationProfile) {
        *self = snapshot;
        let max = self.max_entries;
        cap_map(&mut self.preferences, max, |v| v.abs());
        cap_map(&mut self.communication_styles, max, |v| v.abs());
        cap_map(&mut self.task_types, max, |v| v as f64);
        cap_map(&mut self.emotional_patterns, max, |v| v.abs());
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    fn tally_tasks(&mut self, text: &str) {
        let words = words(text);
        for (task, keywords) in TASK_KEYWORDS {
            if words.iter().any(|w| keywords.contains(&w.as_str())) {
                *self.task_types.entry((*task).to_string()).or_insert(0) += 1;
            }
        }
        let max = self.max_entries;
        cap_map(&mut self.task_types, max, |v| v as f64);
    }

    fn extract_preferences(&mut self, text: &str) {
        let words = words(text);
        for (i, word) in words.iter().enumerate() {
            let negated = i > 0 && NEGATIONS.contains(&words[i - 1].as_str());
            let delta = if POSITIVE_VERBS.contains(&word.as_str()) {
                if negated { -1.0 } else { 1.0 }
            } else if NEGATIVE_VERBS.contains(&word.as_str()) {
                -1.0
            } else {
                continue;
            };
            let object = words[i + 1..]
                .iter()
                .find(|w| w.chars().count() > MAX_INSIGNIFICANT_LEN && !FILLER.contains(&w.as_str()));
            if let Some(object) = object {
                *self.preferences.entry(object.clone()).or_insert(0.0) += delta;
            }
        }
        let max = self.max_entries;
        cap_map(&mut self.preferences, max, |v| v.abs());
    }

    fn score_style(&mut self, text: &str) {
        let words = words(text);
        let mut styles = Vec::new();
        if words.iter().any(|w| matches!(w.as_str(), "please" | "thanks" | "thank")) {
            styles.push("polite");
        }
        if text.contains('!') {
            styles.push("enthusiastic");
        }
        if text.contains('?') {
            styles.push("inquisitive");
        }
        if !words.is_empty() && words.len() <= 5 {
            styles.push("concise");
        }
        if words.len() >= 25 {
            styles.push("detailed");
        }
        for style in styles {
            *self.communication_styles.entry(style.to_string()).or_insert(0.0) += 1.0;
        }
        let max = self.max_entries;
        cap_map(&mut self.communication_styles, max, |v| v.abs());
    }
}

/// Best-effort emotional tag for `text`, if any keyword matches.
pub fn detect_emotion(text: &str) -> Option<&'static str> {
    let words = words(text);
    EMOTION_KEYWORDS
        .iter()
        .find(|(_, keywords)| words.iter().any(|w| keywords.contains(&w.as_str())))
        .map(|(tag, _)| *tag)
}

fn cap_map<V: Copy>(map: &mut BTreeMap<String, V>, max: usize, magnitude: impl Fn(V) -> f64) {
    while map.len() > max {
        let weakest = map
            .iter()
            .min_by(|a, b| magnitude(*a.1).total_cmp(&magnitude(*b.1)))
            .map(|(k, _)| k.clone());
        match weakest {
            Some(key) => {
                map.remove(&key);
            }
            None => break,
        }
    }
}
