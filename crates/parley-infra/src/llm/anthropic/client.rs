//! AnthropicClient -- concrete [`CompletionClient`] implementation for the
//! Anthropic Messages API (`/v1/messages`).
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output. A client built without a key still
//! constructs; every completion then fails with `LlmError::MissingApiKey`.

use std::time::Duration;

use parley_core::llm::client::CompletionClient;
use parley_types::conversation::MessageRole;
use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError, Usage};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use super::types::{
    AnthropicContentBlock, AnthropicErrorBody, AnthropicMessage, AnthropicNonStreamResponse,
    AnthropicRequest,
};
use crate::llm::API_KEY_ENV_VARS;

/// Default Anthropic API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic Messages API client.
///
/// Sends exactly one request per `complete` call. Overall call duration is
/// bounded by the caller; the HTTP client carries its own transport timeout
/// as a backstop.
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    /// Transport-level timeout for a single HTTP exchange.
    const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

    /// Create a new Anthropic client.
    ///
    /// * `api_key` - API key, or `None` to construct a client that rejects every call
    /// * `model` - Model identifier (e.g., "claude-3-5-sonnet-20240620")
    /// * `max_tokens` - Maximum output size per completion
    pub fn new(
        api_key: Option<SecretString>,
        model: String,
        max_tokens: u32,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Self::HTTP_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Provider {
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model,
            max_tokens,
        })
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Whether an API key is configured.
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Convert a [`CompletionRequest`] into an [`AnthropicRequest`].
    ///
    /// The message log's `ai` role is sent as `assistant`, the only
    /// non-user role the Messages API accepts.
    fn to_anthropic_request(&self, request: &CompletionRequest) -> AnthropicRequest {
        let messages = request
            .messages
            .iter()
            .map(|m| AnthropicMessage {
                role: match m.role {
                    MessageRole::User => "user",
                    MessageRole::Ai => "assistant",
                },
                content: m.content.clone(),
            })
            .collect();

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: request.system.clone(),
            messages,
        }
    }
}

/// Map a non-success status and body to an `LlmError`.
fn status_error(status: reqwest::StatusCode, body: String) -> LlmError {
    let message = serde_json::from_str::<AnthropicErrorBody>(&body)
        .map(|b| b.error.message)
        .unwrap_or(body);

    match status.as_u16() {
        401 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited,
        529 => LlmError::Overloaded(message),
        _ => LlmError::Provider {
            message: format!("HTTP {status}: {message}"),
        },
    }
}

/// Text of the first content block. A response whose first block carries no
/// text counts as empty.
fn first_text(response: &AnthropicNonStreamResponse) -> Result<String, LlmError> {
    match response.content.first() {
        Some(AnthropicContentBlock::Text { text }) => Ok(text.clone()),
        Some(AnthropicContentBlock::Other) | None => Err(LlmError::EmptyResponse),
    }
}

// AnthropicClient does NOT derive Debug so internal state is never printed.

impl CompletionClient for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::MissingApiKey(API_KEY_ENV_VARS[0].to_string()))?;

        let body = self.to_anthropic_request(request);
        let url = self.url("/v1/messages");
        debug!(model = %self.model, messages = body.messages.len(), "sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Provider {
                message: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(status_error(status, error_body));
        }

        let anthropic_resp: AnthropicNonStreamResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        let content = first_text(&anthropic_resp)?;

        Ok(CompletionResponse {
            id: anthropic_resp.id,
            content,
            model: anthropic_resp.model,
            stop_reason: anthropic_resp.stop_reason,
            usage: Usage {
                input_tokens: anthropic_resp.usage.input_tokens,
                output_tokens: anthropic_resp.usage.output_tokens,
            },
        })
    }
}
