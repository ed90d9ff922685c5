//! Tunable parameters for the keyword heuristic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::AuditError;

const DEFAULT_STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "an", "and", "any", "are", "as", "at",
    "be", "been", "before", "being", "both", "but", "by", "can", "could", "did", "do", "does",
    "each", "either", "etc", "for", "from", "had", "has", "have", "how", "if", "in", "into", "is",
    "it", "its", "may", "more", "most", "must", "no", "nor", "not", "of", "on", "once", "only",
    "or", "other", "our", "out", "over", "same", "shall", "should", "so", "some", "such", "than",
    "that", "the", "their", "them", "then", "there", "these", "they", "this", "those", "through",
    "to", "under", "until", "up", "upon", "very", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "within", "without", "would", "yes",
    "you", "your",
];

const DEFAULT_TRIVIAL_RESPONSES: &[&str] = &[
    "yes", "y", "yep", "yeah", "yeh", "ok", "okay", "sure", "correct", "true", "no", "n", "nope",
    "false", "none", "na", "n/a",
];

/// Thresholds and word lists for [`KeywordEvaluator`](super::KeywordEvaluator).
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Coverage at or above this is Full conformity
    pub full_threshold: f64,

    /// Coverage at or above this (and below full) is Partial conformity
    pub partial_threshold: f64,

    /// Minimum characters for a baseline word to count as a keyword
    pub min_keyword_len: usize,

    /// Words ignored on both sides
    pub stopwords: BTreeSet<String>,

    /// Whole responses that never count as evidence
    pub trivial_responses: BTreeSet<String>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            full_threshold: 0.6,
            partial_threshold: 0.25,
            min_keyword_len: 4,
            stopwords: DEFAULT_STOPWORDS.iter().map(|s| s.to_string()).collect(),
            trivial_responses: DEFAULT_TRIVIAL_RESPONSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ScoringConfig {
    /// Override both thresholds.
    pub fn with_thresholds(mut self, full: f64, partial: f64) -> Self {
        self.full_threshold = full;
        self.partial_threshold = partial;
        self
    }

    /// Replace the stopword list.
    pub fn with_stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stopwords = words.into_iter().map(|w| w.into().to_lowercase()).collect();
        self
    }

    /// Check that thresholds are ordered and within [0, 1].
    pub fn validate(&self) -> Result<(), AuditError> {
        for (name, value) in [
            ("full_threshold", self.full_threshold),
            ("partial_threshold", self.partial_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AuditError::Config(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.partial_threshold > self.full_threshold {
            return Err(AuditError::Config(format!(
                "partial_threshold ({}) must not exceed full_threshold ({})",
                self.partial_threshold, self.full_threshold
            )));
        }

        if self.min_keyword_len == 0 {
            return Err(AuditError::Config(
                "min_keyword_len must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScoringConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.full_threshold, 0.6);
        assert_eq!(config.partial_threshold, 0.25);
        assert!(config.stopwords.contains("the"));
        assert!(config.trivial_responses.contains("n/a"));
    }

    #[test]
    fn test_out_of_range_threshold_rejected() {
        let config = ScoringConfig::default().with_thresholds(1.2, 0.3);
        assert!(matches!(config.validate(), Err(AuditError::Config(_))));
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let config = ScoringConfig::default().with_thresholds(0.3, 0.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: ScoringConfig = serde_yaml::from_str("full_threshold: 0.8\n").unwrap();
        assert_eq!(config.full_threshold, 0.8);
        assert_eq!(config.partial_threshold, 0.25);
        assert!(!config.stopwords.is_empty());
    }
}
