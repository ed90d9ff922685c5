//! Model provider abstraction.
//!
//! [`LlmProvider`] is the only place model calls are made. Providers hold
//! their keys as [`secrets::ApiKey`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;

pub use secrets::{ApiKey, KeySource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, ANTHROPIC_API_KEY_ENV};

#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Transient failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } | ProviderError::HttpError(_) => true,
            ProviderError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Settings for one completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 500,
            temperature: 0.0,
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    pub model: String,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Provider name for log events.
    fn name(&self) -> &str;
}
