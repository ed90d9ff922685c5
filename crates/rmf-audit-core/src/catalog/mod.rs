//! Questionnaire catalog.
//!
//! The catalog is loaded once at startup and is read-only afterwards. Rows
//! come from a [`QuestionSource`]; the catalog groups the usable ones by
//! category, preserving source order within each category.

mod parser;
mod schema;

pub use parser::{CatalogError, LoadReport, QuestionId, QuestionRecord};
pub use schema::validate_questionnaire;

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::category::Category;

/// Something that can hand over questionnaire rows.
///
/// Implementations return the whole document; shape validation and row
/// parsing happen in [`QuestionCatalog::load`].
pub trait QuestionSource {
    fn document(&self) -> Result<JsonValue, CatalogError>;
}

/// An in-memory questionnaire document.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Json(String),
    Yaml(String),
}

impl QuestionSource for DocumentSource {
    fn document(&self) -> Result<JsonValue, CatalogError> {
        match self {
            DocumentSource::Json(text) => Ok(serde_json::from_str(text)?),
            DocumentSource::Yaml(text) => Ok(serde_yaml::from_str(text)?),
        }
    }
}

/// A questionnaire file; the format is picked from the extension.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QuestionSource for FileSource {
    fn document(&self) -> Result<JsonValue, CatalogError> {
        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let contents = match extension.as_str() {
            "json" | "yaml" | "yml" => fs::read_to_string(&self.path)?,
            _ => {
                return Err(CatalogError::UnsupportedFormat(
                    self.path.display().to_string(),
                ))
            }
        };

        if extension == "json" {
            DocumentSource::Json(contents).document()
        } else {
            DocumentSource::Yaml(contents).document()
        }
    }
}

/// Questions grouped by category.
#[derive(Debug, Clone, Default)]
pub struct QuestionCatalog {
    by_category: BTreeMap<Category, Vec<QuestionRecord>>,
    report: LoadReport,
}

impl QuestionCatalog {
    /// Load from any source, failing if nothing usable remains.
    pub fn load(source: &dyn QuestionSource) -> Result<Self, CatalogError> {
        let document = source.document()?;
        validate_questionnaire(&document).map_err(CatalogError::SchemaError)?;

        let (records, mut report) = parser::parse_rows(parser::document_rows(document));
        let mut catalog = Self::group(records)?;
        report.kept = catalog.len();
        catalog.report = report;

        tracing::info!(
            rows = catalog.report.rows_read,
            kept = catalog.report.kept,
            dropped = catalog.report.dropped(),
            categories = catalog.categories().len(),
            "Question catalog loaded"
        );

        Ok(catalog)
    }

    /// Parse a questionnaire from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        Self::load(&DocumentSource::Json(json.to_string()))
    }

    /// Parse a questionnaire from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        Self::load(&DocumentSource::Yaml(yaml.to_string()))
    }

    /// Load a questionnaire file (`.json`, `.yaml` or `.yml`).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        Self::load(&FileSource::new(path.as_ref()))
    }

    /// Build from already-typed records. Blank sub-questions and duplicate
    /// ids are dropped as they would be from a file.
    pub fn from_records(records: impl IntoIterator<Item = QuestionRecord>) -> Result<Self, CatalogError> {
        let mut seen = std::collections::HashSet::new();
        let mut report = LoadReport::default();

        let usable: Vec<QuestionRecord> = records
            .into_iter()
            .filter(|record| {
                report.rows_read += 1;
                if record.sub_question.trim().is_empty() {
                    report.dropped_blank_question += 1;
                    false
                } else if !seen.insert(record.question_id.clone()) {
                    report.dropped_duplicate_id += 1;
                    false
                } else {
                    true
                }
            })
            .collect();

        let mut catalog = Self::group(usable)?;
        report.kept = catalog.len();
        catalog.report = report;
        Ok(catalog)
    }

    fn group(records: Vec<QuestionRecord>) -> Result<Self, CatalogError> {
        if records.is_empty() {
            return Err(CatalogError::NoUsableRows);
        }

        let mut by_category: BTreeMap<Category, Vec<QuestionRecord>> = BTreeMap::new();
        for record in records {
            by_category.entry(record.category).or_default().push(record);
        }

        Ok(Self {
            by_category,
            report: LoadReport::default(),
        })
    }

    /// Categories with at least one question, in canonical order.
    pub fn categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.by_category.get(c).is_some_and(|q| !q.is_empty()))
            .collect()
    }

    /// Whether a category has at least one question.
    pub fn contains(&self, category: Category) -> bool {
        !self.questions_for(category).is_empty()
    }

    /// Questions for a category in source order; empty if none.
    pub fn questions_for(&self, category: Category) -> &[QuestionRecord] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Questions for a category given as free text; empty for unknown labels.
    pub fn questions_for_label(&self, label: &str) -> &[QuestionRecord] {
        Category::from_label(label)
            .map(|c| self.questions_for(c))
            .unwrap_or(&[])
    }

    /// Find a question by id across all categories.
    pub fn question(&self, question_id: &QuestionId) -> Option<&QuestionRecord> {
        self.by_category
            .values()
            .flatten()
            .find(|q| &q.question_id == question_id)
    }

    /// Total number of usable questions.
    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// What happened to each source row during loading.
    pub fn load_report(&self) -> &LoadReport {
        &self.report
    }
}
