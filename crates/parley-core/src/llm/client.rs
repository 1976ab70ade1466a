//! CompletionClient trait definition.
//!
//! The orchestrator talks to the text-generation service only through this
//! trait. Implementations live in parley-infra (e.g., `AnthropicClient`).

use parley_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for text-generation backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition). A single
/// request is made per call; implementations must not retry.
pub trait CompletionClient: Send + Sync {
    /// Human-readable provider name (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Model identifier sent with every request.
    fn model(&self) -> &str;

    /// Send the system prompt and ordered history, receive the generated text.
    ///
    /// Network failure, a non-success status, a malformed body, and an
    /// empty content list are all reported as `LlmError`.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
