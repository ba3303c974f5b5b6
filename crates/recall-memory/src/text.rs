//! Naive text helpers shared by the memory and context layers.
//!
//! These are the stand-in for a real NLU keyword extractor. A token is built
//! by taking a whitespace-separated word, dropping every non-alphanumeric
//! character and lowercasing the rest. *Significant* tokens are the ones
//! longer than three characters.
//!
//! ```rust
//! use recall_memory::text::significant_tokens;
//!
//! let tokens = significant_tokens("My billing issue, again!");
//! assert!(tokens.contains("billing"));
//! assert!(tokens.contains("issue"));
//! assert!(!tokens.contains("my"));
//! ```

use std::collections::HashSet;

/// Tokens of this length or shorter are ignored by [`significant_tokens`].
pub const MAX_INSIGNIFICANT_LEN: usize = 3;

/// Every lowercase alphanumeric word of `text`, in order, duplicates kept.
pub fn words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// Significant tokens of `text` in first-seen order, without duplicates.
pub fn significant_tokens_ordered(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    words(text)
        .into_iter()
        .filter(|w| w.chars().count() > MAX_INSIGNIFICANT_LEN)
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// The set of significant tokens of `text`.
pub fn significant_tokens(text: &str) -> HashSet<String> {
    words(text)
        .into_iter()
        .filter(|w| w.chars().count() > MAX_INSIGNIFICANT_LEN)
        .collect()
}

/// Fraction of `terms` that also appear in `candidate`.
///
/// Returns `0.0` when `terms` is empty, so the result is always in `[0, 1]`.
pub fn overlap_ratio(candidate: &HashSet<String>, terms: &HashSet<String>) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let shared = terms.iter().filter(|t| candidate.contains(*t)).count();
    shared as f64 / terms.len() as f64
}

/// Number of tokens two sets have in common.
pub fn common_count(a: &HashSet<String>, b: &HashSet<String>) -> usize {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().filter(|t| large.contains(*t)).count()
}
