//! # rmf-audit-runtime
//!
//! Optional model-assisted conformity evaluation for rmf-audit.
//!
//! [`AssistedEvaluator`] asks a language model to judge submitted evidence
//! against a question's baseline and returns the same
//! [`Evaluation`](rmf_audit_core::Evaluation) the keyword heuristic does.
//!
//! ## Important
//!
//! This crate is OPTIONAL. `rmf-audit-core` is fully deterministic and never
//! makes network calls. Every failure here (open circuit, exhausted budget,
//! timeout, provider error, unverifiable model output) degrades to the
//! keyword heuristic; evaluation itself never fails.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rmf_audit_runtime::{AnthropicProvider, AssistedEvaluator, RuntimeConfig};
//!
//! let provider = Arc::new(AnthropicProvider::from_env()?);
//! let assisted = AssistedEvaluator::new(provider, RuntimeConfig::default(), scoring);
//!
//! let evaluation = assisted.submit(&service, &session_id, "Signed safety case on file").await?;
//! assert!(evaluation.assisted || evaluation.rationale.starts_with("Assisted evaluation unavailable"));
//! ```

pub mod assisted;
pub mod cache;
pub mod config;
pub mod judgment;
pub mod prompts;
pub mod providers;
pub mod resilience;

pub use assisted::AssistedEvaluator;
pub use cache::{CacheKey, VerdictCache};
pub use config::{BudgetConfig, CacheConfig, RetryConfig, RuntimeConfig};
pub use judgment::{Judgment, JudgmentError};
pub use providers::{
    ApiKey, ChatMessage, CompletionConfig, CompletionResponse, KeySource, LlmProvider,
    ProviderError, TokenUsage,
};
pub use resilience::{
    BudgetTracker, CircuitBreaker, CircuitBreakerConfig, CircuitState, FallbackReason, LlmUsage,
};

#[cfg(feature = "anthropic")]
pub use providers::AnthropicProvider;

use thiserror::Error;

/// Errors from setting up the runtime.
///
/// Evaluation never returns these; they only surface while building a
/// provider or loading configuration.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid runtime configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
