//! Parsing and verifying model judgments.
//!
//! A judgment is only accepted when every term it cites actually occurs in
//! the submitted evidence. Anything else is rejected outright and the
//! caller falls back to the keyword heuristic; there is no best-effort
//! repair of model output.

use lazy_static::lazy_static;
use regex::Regex;
use rmf_audit_core::ConformityVerdict;
use serde::{Deserialize, Serialize};
use thiserror::Error;

lazy_static! {
    static ref FENCED: Regex = Regex::new(r"(?s)^```(?:json)?\s*(?P<body>.*?)\s*```$").unwrap();
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JudgmentError {
    #[error("malformed judgment: {0}")]
    Malformed(String),

    #[error("judgment has an empty rationale")]
    EmptyRationale,

    #[error("'{verdict}' verdict cites no evidence")]
    MissingCitations { verdict: ConformityVerdict },

    #[error("cited term '{term}' does not appear in the submitted evidence")]
    UncitedTerm { term: String },
}

/// A model's verdict on one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Judgment {
    pub verdict: ConformityVerdict,
    pub rationale: String,
    #[serde(default)]
    pub cited_terms: Vec<String>,
}

impl Judgment {
    /// Parse a reply: a bare JSON object, optionally inside one code fence.
    pub fn parse(content: &str) -> Result<Self, JudgmentError> {
        let trimmed = content.trim();
        let body = FENCED
            .captures(trimmed)
            .and_then(|caps| caps.name("body"))
            .map_or(trimmed, |m| m.as_str());

        serde_json::from_str(body).map_err(|e| JudgmentError::Malformed(e.to_string()))
    }

    /// Check the judgment against the evidence it claims to be about.
    pub fn verify(&self, evidence: &str) -> Result<(), JudgmentError> {
        if self.rationale.trim().is_empty() {
            return Err(JudgmentError::EmptyRationale);
        }
        if self.verdict != ConformityVerdict::No && self.cited_terms.is_empty() {
            return Err(JudgmentError::MissingCitations {
                verdict: self.verdict,
            });
        }

        let haystack = evidence.to_lowercase();
        for term in &self.cited_terms {
            let needle = term.trim().to_lowercase();
            if needle.is_empty() || !haystack.contains(&needle) {
                return Err(JudgmentError::UncitedTerm { term: term.clone() });
            }
        }
        Ok(())
    }

    pub fn parse_verified(content: &str, evidence: &str) -> Result<Self, JudgmentError> {
        let judgment = Self::parse(content)?;
        judgment.verify(evidence)?;
        Ok(judgment)
    }
}
