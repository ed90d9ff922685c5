//! Questionnaire row parsing.
//!
//! Rows arrive loosely typed (spreadsheet exports converted to JSON or
//! YAML). They are parsed exactly once into [`QuestionRecord`]; nothing past
//! this module sees a raw row.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::category::Category;

/// Errors that can occur when loading a questionnaire.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read questionnaire: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Questionnaire does not match schema: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Unsupported questionnaire format: {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(String),

    #[error("Questionnaire contains no usable questions")]
    NoUsableRows,
}

/// Question identifier: spreadsheets hold either numbers or strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionId {
    Number(i64),
    Text(String),
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionId::Number(n) => write!(f, "{}", n),
            QuestionId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        QuestionId::Text(value.to_string())
    }
}

impl From<i64> for QuestionId {
    fn from(value: i64) -> Self {
        QuestionId::Number(value)
    }
}

/// A single audit question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Stable identifier
    pub question_id: QuestionId,

    /// Trustworthiness characteristic the question belongs to
    pub category: Category,

    /// Governing control (e.g. "MEASURE 2.10"), informational only
    #[serde(default)]
    pub control_reference: String,

    /// Text presented to the auditee
    pub sub_question: String,

    /// Evidence expected to satisfy the question
    #[serde(default)]
    pub baseline_evidence: String,
}

impl QuestionRecord {
    pub fn new(
        question_id: impl Into<QuestionId>,
        category: Category,
        sub_question: impl Into<String>,
        baseline_evidence: impl Into<String>,
    ) -> Self {
        Self {
            question_id: question_id.into(),
            category,
            control_reference: String::new(),
            sub_question: sub_question.into(),
            baseline_evidence: baseline_evidence.into(),
        }
    }

    /// Set the control reference.
    pub fn with_control(mut self, control: impl Into<String>) -> Self {
        self.control_reference = control.into();
        self
    }
}

/// Counts of what happened to each source row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub kept: usize,
    pub dropped_blank_question: usize,
    pub dropped_unknown_category: usize,
    pub dropped_duplicate_id: usize,
    pub dropped_malformed: usize,
}

impl LoadReport {
    pub fn dropped(&self) -> usize {
        self.dropped_blank_question
            + self.dropped_unknown_category
            + self.dropped_duplicate_id
            + self.dropped_malformed
    }
}

/// Raw id cell. Spreadsheet exports turn integer ids into floats.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Int(i64),
    Float(f64),
    Text(String),
}

/// A row as exported, accepting both field names and spreadsheet headers.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default, alias = "Question ID")]
    question_id: Option<RawId>,

    #[serde(default, alias = "Trust-worthiness characteristic")]
    category: Option<String>,

    #[serde(default, alias = "NIST AI RMF Control")]
    control_reference: Option<String>,

    #[serde(default, alias = "Sub Question")]
    sub_question: Option<String>,

    #[serde(default, alias = "Baseline Evidence", alias = "Baseline Evidence ")]
    baseline_evidence: Option<String>,
}

/// Extract the row array from either accepted document shape.
pub(crate) fn document_rows(document: JsonValue) -> Vec<JsonValue> {
    match document {
        JsonValue::Array(rows) => rows,
        JsonValue::Object(mut map) => match map.remove("questions") {
            Some(JsonValue::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Turn raw rows into typed records, dropping rows that cannot be used.
pub(crate) fn parse_rows(rows: Vec<JsonValue>) -> (Vec<QuestionRecord>, LoadReport) {
    let mut report = LoadReport {
        rows_read: rows.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(rows.len());
    let mut seen = HashSet::new();

    for (index, value) in rows.into_iter().enumerate() {
        let row_number = index + 1;

        let raw: RawRow = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(row = row_number, error = %e, "Dropping malformed questionnaire row");
                report.dropped_malformed += 1;
                continue;
            }
        };

        let sub_question = trimmed(raw.sub_question);
        if sub_question.is_empty() {
            tracing::debug!(row = row_number, "Dropping row without sub-question");
            report.dropped_blank_question += 1;
            continue;
        }

        let label = trimmed(raw.category);
        let Some(category) = Category::from_label(&label) else {
            tracing::warn!(row = row_number, category = %label, "Dropping row with unknown category");
            report.dropped_unknown_category += 1;
            continue;
        };

        let question_id = raw
            .question_id
            .and_then(normalize_id)
            .unwrap_or_else(|| QuestionId::Text(format!("row-{}", row_number)));

        if !seen.insert(question_id.clone()) {
            tracing::warn!(row = row_number, question_id = %question_id, "Dropping duplicate question id");
            report.dropped_duplicate_id += 1;
            continue;
        }

        records.push(QuestionRecord {
            question_id,
            category,
            control_reference: trimmed(raw.control_reference),
            sub_question,
            baseline_evidence: trimmed(raw.baseline_evidence),
        });
    }

    report.kept = records.len();
    (records, report)
}

fn normalize_id(raw: RawId) -> Option<QuestionId> {
    match raw {
        RawId::Int(n) => Some(QuestionId::Number(n)),
        RawId::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(QuestionId::Number(f as i64)),
        RawId::Float(f) => Some(QuestionId::Text(f.to_string())),
        RawId::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(QuestionId::Text(s.to_string()))
            }
        }
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}
