//! JSON Schema check for questionnaire documents.
//!
//! The schema only pins down the document shape (rows must be objects).
//! Row contents are checked by the parser so that one bad row is dropped
//! instead of rejecting the whole questionnaire.

use serde_json::Value as JsonValue;
use std::sync::OnceLock;

/// Embedded questionnaire schema (loaded at compile time).
const QUESTIONNAIRE_SCHEMA_JSON: &str = include_str!("../../schema/questionnaire.schema.json");

/// Compiled validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn get_validator() -> Result<&'static jsonschema::Validator, String> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: JsonValue = serde_json::from_str(QUESTIONNAIRE_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result.as_ref().map_err(|e| e.clone())
}

/// Validate a questionnaire document against the schema.
///
/// Returns every violation found, formatted with its instance path.
pub fn validate_questionnaire(document: &JsonValue) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| format!("{} at '{}'", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
