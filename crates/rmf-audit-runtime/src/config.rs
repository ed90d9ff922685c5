//! Runtime configuration.
//!
//! Durations are written the humantime way (`15s`, `500ms`, `1h`):
//!
//! ```yaml
//! model: claude-sonnet-4-5
//! timeout: 20s
//! circuit_breaker:
//!   failure_threshold: 5
//!   recovery_timeout: 1m
//! budget:
//!   global_max_tokens: 50000
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::resilience::CircuitBreakerConfig;
use crate::RuntimeError;

/// Configuration for model-assisted evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens the model may generate per call
    pub max_tokens: u32,

    /// Sampling temperature (0.0 for deterministic)
    pub temperature: f32,

    /// Upper bound on one evaluation's model round trip, retries included
    #[serde(with = "duration_human")]
    pub timeout: Duration,

    /// API endpoint override (uses the provider default when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    pub circuit_breaker: CircuitBreakerConfig,
    pub budget: BudgetConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 500,
            temperature: 0.0,
            timeout: Duration::from_secs(15),
            endpoint: None,
            circuit_breaker: CircuitBreakerConfig::default(),
            budget: BudgetConfig::default(),
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Token budget shared by every evaluation made through one evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BudgetConfig {
    pub global_max_tokens: u32,

    /// Tokens reserved per call before the provider reports actual usage
    pub estimated_call_tokens: u32,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            global_max_tokens: 20_000,
            estimated_call_tokens: 800,
        }
    }
}

/// Retries for transient provider errors (rate limits, HTTP failures).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_retries: usize,

    #[serde(with = "duration_human")]
    pub min_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            min_delay: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,

    #[serde(with = "duration_human")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RuntimeError> {
        serde_yaml::from_str(yaml).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    pub fn from_json_str(json: &str) -> Result<Self, RuntimeError> {
        serde_json::from_str(json).map_err(|e| RuntimeError::Config(e.to_string()))
    }

    /// Load from a `.json`, `.yaml` or `.yml` file and validate.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| RuntimeError::Config(format!("{}: {}", path.display(), e)))?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents)?,
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents)?,
            _ => {
                return Err(RuntimeError::Config(format!(
                    "{}: expected a .json, .yaml or .yml file",
                    path.display()
                )))
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.model.trim().is_empty() {
            return Err(RuntimeError::Config("model must not be empty".to_string()));
        }
        if self.max_tokens == 0 {
            return Err(RuntimeError::Config("max_tokens must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(RuntimeError::Config(format!(
                "temperature must be within [0, 1], got {}",
                self.temperature
            )));
        }
        if self.timeout.is_zero() {
            return Err(RuntimeError::Config("timeout must be positive".to_string()));
        }
        if self.circuit_breaker.failure_threshold == 0 || self.circuit_breaker.success_threshold == 0
        {
            return Err(RuntimeError::Config(
                "circuit breaker thresholds must be positive".to_string(),
            ));
        }
        if self.budget.estimated_call_tokens > self.budget.global_max_tokens {
            return Err(RuntimeError::Config(format!(
                "estimated_call_tokens ({}) exceeds global_max_tokens ({})",
                self.budget.estimated_call_tokens, self.budget.global_max_tokens
            )));
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(RuntimeError::Config(
                    "endpoint must start with http:// or https://".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Completion settings derived from this configuration.
    pub fn completion(&self) -> crate::providers::CompletionConfig {
        crate::providers::CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }
}

pub(crate) mod duration_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(RuntimeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_humantime_durations() {
        let config = RuntimeConfig::from_yaml_str(
            "timeout: 20s\ncircuit_breaker:\n  recovery_timeout: 1m\ncache:\n  ttl: 2h\n",
        )
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.circuit_breaker.recovery_timeout, Duration::from_secs(60));
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.cache.ttl, Duration::from_secs(7200));

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"timeout\":\"20s\""));
        assert_eq!(RuntimeConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = RuntimeConfig {
            temperature: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RuntimeConfig {
            endpoint: Some("api.example.com".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(RuntimeConfig::from_yaml_str("timeout: soon\n").is_err());
        assert!(RuntimeConfig::from_json_str(r#"{"modle": "x"}"#).is_err());
    }
}
