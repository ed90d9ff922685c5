//! The seven AI RMF trustworthiness characteristics.
//!
//! Categories are a closed set. Questionnaire exports spell them in several
//! ways ("Valid & Reliable", "valid and reliable", "Fair – With Harmful Bias
//! Managed", "fair"), so parsing normalizes before matching and everything
//! downstream works with the enum.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::AuditError;

/// A trustworthiness characteristic that groups audit questions.
///
/// Declaration order is the canonical presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    PrivacyEnhanced,
    ValidReliable,
    Safe,
    SecureResilient,
    AccountableTransparent,
    ExplainableInterpretable,
    FairBiasManaged,
}

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^a-z0-9]+").unwrap();

    // Free-text mentions, one list per category in canonical order.
    static ref MENTION_PATTERNS: Vec<(Category, Regex)> = vec![
        (Category::PrivacyEnhanced, Regex::new(r"(?i)\bprivacy\b").unwrap()),
        (Category::ValidReliable, Regex::new(r"(?i)\b(valid(ity)?\s*(&|and)\s*reliab(le|ility)|reliab(le|ility)|validity)\b").unwrap()),
        (Category::Safe, Regex::new(r"(?i)\bsafe(ty)?\b").unwrap()),
        (Category::SecureResilient, Regex::new(r"(?i)\b(secure|security|resilien(t|ce))\b").unwrap()),
        (Category::AccountableTransparent, Regex::new(r"(?i)\b(accountab(le|ility)|transparen(t|cy))\b").unwrap()),
        (Category::ExplainableInterpretable, Regex::new(r"(?i)\b(explainab(le|ility)|interpretab(le|ility))\b").unwrap()),
        (Category::FairBiasManaged, Regex::new(r"(?i)\b(fair(ness)?|bias(ed)?)\b").unwrap()),
    ];
}

impl Category {
    /// All categories in canonical order.
    pub const ALL: [Category; 7] = [
        Category::PrivacyEnhanced,
        Category::ValidReliable,
        Category::Safe,
        Category::SecureResilient,
        Category::AccountableTransparent,
        Category::ExplainableInterpretable,
        Category::FairBiasManaged,
    ];

    /// Canonical label as it appears in the questionnaire.
    pub fn label(&self) -> &'static str {
        match self {
            Category::PrivacyEnhanced => "Privacy-Enhanced",
            Category::ValidReliable => "Valid & Reliable",
            Category::Safe => "Safe",
            Category::SecureResilient => "Secure & Resilient",
            Category::AccountableTransparent => "Accountable & Transparent",
            Category::ExplainableInterpretable => "Explainable and Interpretable",
            Category::FairBiasManaged => "Fair – With Harmful Bias Managed",
        }
    }

    /// One-line description shown when listing categories.
    pub fn description(&self) -> &'static str {
        match self {
            Category::PrivacyEnhanced => "Data protection and privacy measures",
            Category::ValidReliable => "Model accuracy and performance validation",
            Category::Safe => "Safety measures and risk mitigation",
            Category::SecureResilient => "Security controls and resilience",
            Category::AccountableTransparent => "Governance and transparency",
            Category::ExplainableInterpretable => "Model interpretability",
            Category::FairBiasManaged => "Bias mitigation and fairness",
        }
    }

    /// Parse a label, tolerating punctuation, `&`/`and`, dashes and the
    /// common short names.
    pub fn from_label(label: &str) -> Option<Category> {
        let normalized = normalize_label(label);
        Category::ALL.into_iter().find(|category| {
            normalize_label(category.label()) == normalized
                || category.aliases().contains(&normalized.as_str())
        })
    }

    /// Categories mentioned anywhere in free text, in canonical order.
    pub fn mentioned_in(text: &str) -> Vec<Category> {
        MENTION_PATTERNS
            .iter()
            .filter(|(_, pattern)| pattern.is_match(text))
            .map(|(category, _)| *category)
            .collect()
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Category::PrivacyEnhanced => &["privacy", "privacy enhanced"],
            Category::ValidReliable => &["valid", "reliable", "validity", "reliability"],
            Category::Safe => &["safety"],
            Category::SecureResilient => &["secure", "security", "resilient", "resilience"],
            Category::AccountableTransparent => &[
                "accountable",
                "transparent",
                "accountability",
                "transparency",
            ],
            Category::ExplainableInterpretable => &[
                "explainable",
                "interpretable",
                "explainability",
                "interpretability",
            ],
            Category::FairBiasManaged => &["fair", "fairness", "bias", "fair with bias managed"],
        }
    }
}

/// Lowercase, spell `&` as `and`, collapse everything non-alphanumeric.
fn normalize_label(label: &str) -> String {
    let lower = label.to_lowercase().replace('&', " and ");
    NON_WORD.replace_all(&lower, " ").trim().to_string()
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::from_label(s).ok_or_else(|| AuditError::UnknownCategory {
            category: s.to_string(),
        })
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Category::from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown category '{}'", label)))
    }
}
