//! Conformity evaluation.
//!
//! An evaluator maps (baseline evidence, submitted evidence) to a
//! [`ConformityVerdict`] with a rationale. The reference implementation,
//! [`KeywordEvaluator`], is a pure keyword-coverage heuristic:
//!
//! ```text
//! coverage = |baseline keywords ∩ submitted tokens| / |baseline keywords|
//!
//! coverage >= full_threshold     -> Full
//! coverage >= partial_threshold  -> Partial
//! otherwise                      -> No
//! ```
//!
//! Other backends plug in behind [`ConformityEvaluator`] and must keep the
//! same verdict set and never fail for string input.

mod config;
pub mod tokens;

pub use config::ScoringConfig;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Conformity level for one piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConformityVerdict {
    Full,
    Partial,
    No,
}

impl ConformityVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConformityVerdict::Full => "full",
            ConformityVerdict::Partial => "partial",
            ConformityVerdict::No => "no",
        }
    }

    /// Human-facing label ("Full Conformity", ...).
    pub fn label(&self) -> &'static str {
        match self {
            ConformityVerdict::Full => "Full Conformity",
            ConformityVerdict::Partial => "Partial Conformity",
            ConformityVerdict::No => "No Conformity",
        }
    }
}

impl fmt::Display for ConformityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of evaluating one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub verdict: ConformityVerdict,
    pub rationale: String,

    /// Fraction of baseline keywords found in the submission (0.0 - 1.0)
    pub coverage: f64,

    /// Baseline keywords present in the submission, sorted
    #[serde(default)]
    pub matched_terms: Vec<String>,

    /// Baseline keywords absent from the submission, sorted
    #[serde(default)]
    pub missing_terms: Vec<String>,

    /// Whether a language model produced the verdict
    #[serde(default)]
    pub assisted: bool,
}

impl Evaluation {
    fn keyword(
        verdict: ConformityVerdict,
        rationale: impl Into<String>,
        coverage: f64,
        matched_terms: Vec<String>,
        missing_terms: Vec<String>,
    ) -> Self {
        Self {
            verdict,
            rationale: rationale.into(),
            coverage,
            matched_terms,
            missing_terms,
            assisted: false,
        }
    }
}

/// Maps (baseline, submitted evidence) to a verdict.
///
/// Implementations must be deterministic for the same input and must not
/// fail: every string pair yields an [`Evaluation`].
pub trait ConformityEvaluator: Send + Sync {
    /// Short name used in log events.
    fn name(&self) -> &'static str;

    fn evaluate(&self, baseline: &str, evidence: &str) -> Evaluation;
}

/// The reference keyword-coverage heuristic.
#[derive(Debug, Clone, Default)]
pub struct KeywordEvaluator {
    config: ScoringConfig,
}

impl KeywordEvaluator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Whether a submission is a bare affirmation or negation.
    pub fn is_trivial(&self, evidence: &str) -> bool {
        self.config
            .trivial_responses
            .contains(&tokens::normalize_response(evidence))
    }

    fn verdict_for(&self, coverage: f64) -> ConformityVerdict {
        if coverage >= self.config.full_threshold {
            ConformityVerdict::Full
        } else if coverage >= self.config.partial_threshold {
            ConformityVerdict::Partial
        } else {
            ConformityVerdict::No
        }
    }
}

impl ConformityEvaluator for KeywordEvaluator {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn evaluate(&self, baseline: &str, evidence: &str) -> Evaluation {
        let keywords = tokens::keywords(
            baseline,
            &self.config.stopwords,
            self.config.min_keyword_len,
        );

        if evidence.trim().is_empty() {
            return Evaluation::keyword(
                ConformityVerdict::No,
                "no evidence provided.",
                0.0,
                Vec::new(),
                keywords.into_iter().collect(),
            );
        }

        if self.is_trivial(evidence) {
            return Evaluation::keyword(
                ConformityVerdict::No,
                format!(
                    "'{}' is a bare response; describe or reference the evidence itself.",
                    evidence.trim()
                ),
                0.0,
                Vec::new(),
                keywords.into_iter().collect(),
            );
        }

        if keywords.is_empty() {
            return Evaluation::keyword(
                ConformityVerdict::Partial,
                "baseline names no measurable evidence; submission recorded for manual review.",
                0.0,
                Vec::new(),
                Vec::new(),
            );
        }

        let submitted = tokens::tokenize(evidence, &self.config.stopwords);
        let (matched, missing): (Vec<String>, Vec<String>) = keywords
            .into_iter()
            .partition(|keyword| submitted.contains(keyword));

        let total = matched.len() + missing.len();
        let coverage = matched.len() as f64 / total as f64;
        let verdict = self.verdict_for(coverage);

        let rationale = match verdict {
            ConformityVerdict::Full => format!(
                "evidence covers {} of {} baseline terms ({:.0}%).",
                matched.len(),
                total,
                coverage * 100.0
            ),
            ConformityVerdict::Partial => format!(
                "evidence covers {} of {} baseline terms ({:.0}%); missing: {}.",
                matched.len(),
                total,
                coverage * 100.0,
                missing.join(", ")
            ),
            ConformityVerdict::No => format!(
                "evidence covers {} of {} baseline terms ({:.0}%); expected: {}.",
                matched.len(),
                total,
                coverage * 100.0,
                missing.join(", ")
            ),
        };

        tracing::debug!(
            evaluator = self.name(),
            verdict = %verdict.as_str(),
            coverage,
            matched = matched.len(),
            total,
            "Evidence evaluated"
        );

        Evaluation::keyword(verdict, rationale, coverage, matched, missing)
    }
}
