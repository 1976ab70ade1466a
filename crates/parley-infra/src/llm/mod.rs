//! Completion client implementations.
//!
//! Contains the concrete implementation of the [`CompletionClient`] trait
//! defined in `parley-core` for the Anthropic Messages API.
//!
//! [`CompletionClient`]: parley_core::llm::client::CompletionClient

pub mod anthropic;

use secrecy::SecretString;

/// Environment variables checked for the Anthropic API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"];

/// Read the Anthropic API key from the environment, if set and non-empty.
pub fn api_key_from_env() -> Option<SecretString> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
        .map(SecretString::from)
}
