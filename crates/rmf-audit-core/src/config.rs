//! Engine configuration.
//!
//! Every section has defaults, so a config file only carries what it
//! overrides:
//!
//! ```yaml
//! scoring:
//!   full_threshold: 0.7
//! registry:
//!   idle_timeout: 45m
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::assessment::AssessmentPolicy;
use crate::evaluator::ScoringConfig;
use crate::registry::RegistryConfig;
use crate::AuditError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub scoring: ScoringConfig,
    pub registry: RegistryConfig,
    pub assessment: AssessmentPolicy,
}

impl AuditConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AuditError> {
        serde_yaml::from_str(yaml).map_err(|e| AuditError::Config(e.to_string()))
    }

    pub fn from_json_str(json: &str) -> Result<Self, AuditError> {
        serde_json::from_str(json).map_err(|e| AuditError::Config(e.to_string()))
    }

    /// Load from a `.json`, `.yaml` or `.yml` file and validate.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| AuditError::Config(format!("{}: {}", path.display(), e)))?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents)?,
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents)?,
            _ => {
                return Err(AuditError::Config(format!(
                    "{}: expected a .json, .yaml or .yml file",
                    path.display()
                )))
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AuditError> {
        self.scoring.validate()?;
        self.registry.validate()?;
        self.assessment.validate()
    }
}
