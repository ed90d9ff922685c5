//! Text normalization shared by the keyword heuristic.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    /// Anything that is not a letter or digit separates words.
    static ref WORD_SEPARATOR: Regex = Regex::new(r"[^\p{L}\p{N}]+").unwrap();
}

/// Lowercase, strip punctuation and split into a set of distinct words,
/// discarding stopwords.
pub fn tokenize(text: &str, stopwords: &BTreeSet<String>) -> BTreeSet<String> {
    let lower = text.to_lowercase();
    WORD_SEPARATOR
        .split(&lower)
        .filter(|word| !word.is_empty())
        .filter(|word| !stopwords.contains(*word))
        .map(str::to_string)
        .collect()
}

/// Salient baseline terms: tokens at least `min_len` characters long.
pub fn keywords(text: &str, stopwords: &BTreeSet<String>, min_len: usize) -> BTreeSet<String> {
    tokenize(text, stopwords)
        .into_iter()
        .filter(|word| word.chars().count() >= min_len)
        .collect()
}

/// Collapse a response to the form used for trivial-answer matching.
pub fn normalize_response(text: &str) -> String {
    text.trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_lowercase()
}
