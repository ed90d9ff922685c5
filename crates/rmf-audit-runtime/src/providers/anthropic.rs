//! Anthropic Messages API provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::secrets::{ApiKey, KeySource};
use super::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, Role,
    TokenUsage,
};

/// Environment variable holding the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    api_key: ApiKey,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("api_key", &self.api_key)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_key(ApiKey::explicit(api_key))
    }

    /// Read the key from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::with_key(ApiKey::from_env(ANTHROPIC_API_KEY_ENV)?)
    }

    /// `api_key` overrides `ANTHROPIC_API_KEY`; `base_url` points at a proxy
    /// or gateway instead of the public endpoint.
    pub fn from_config(api_key: Option<&str>, base_url: Option<&str>) -> Result<Self, ProviderError> {
        let provider = Self::with_key(ApiKey::resolve(api_key, ANTHROPIC_API_KEY_ENV)?)?;
        Ok(match base_url {
            Some(url) => provider.with_base_url(url),
            None => provider,
        })
    }

    fn with_key(api_key: ApiKey) -> Result<Self, ProviderError> {
        if api_key.is_blank() {
            return Err(ProviderError::NotConfigured("empty Anthropic API key".to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Split out system messages; the API takes them as a top-level field.
fn split_system(messages: Vec<ChatMessage>) -> (Option<String>, Vec<WireMessage>) {
    let mut system: Vec<String> = Vec::new();
    let mut rest = Vec::new();
    for message in messages {
        match message.role {
            Role::System => system.push(message.content),
            Role::User => rest.push(WireMessage {
                role: "user",
                content: message.content,
            }),
            Role::Assistant => rest.push(WireMessage {
                role: "assistant",
                content: message.content,
            }),
        }
    }
    let system = (!system.is_empty()).then(|| system.join("\n\n"));
    (system, rest)
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let (system, messages) = split_system(messages);
        let request = MessagesRequest {
            model: &config.model,
            max_tokens: config.max_tokens,
            system,
            messages,
            temperature: config.temperature,
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", API_VERSION)
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::AuthError);
        }
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error.message,
                Err(e) => e.to_string(),
            };
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(CompletionResponse {
            content: body
                .content
                .into_iter()
                .filter_map(|block| block.text)
                .collect::<Vec<_>>()
                .join(""),
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
