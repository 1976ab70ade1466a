//! Service configuration types for Parley.
//!
//! `ServiceConfig` represents the `config.toml` that controls the completion
//! model, timeouts, and session lifetime.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Parley service.
///
/// Loaded from `~/.parley/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Model identifier sent with every completion request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum output size per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound on a single completion call, in seconds.
    #[serde(default = "default_completion_timeout_secs")]
    pub completion_timeout_secs: u64,

    /// How long a login session stays valid, in hours.
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,

    /// Base URL of the Anthropic Messages API.
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,

    /// Identity provider endpoint returning `{name, email}` for an access token.
    #[serde(default = "default_userinfo_url")]
    pub userinfo_url: String,

    /// Allow any origin in CORS responses.
    #[serde(default = "default_cors_allow_any")]
    pub cors_allow_any: bool,
}

fn default_model() -> String {
    "claude-3-5-sonnet-20240620".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_completion_timeout_secs() -> u64 {
    60
}

fn default_session_ttl_hours() -> i64 {
    24
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_userinfo_url() -> String {
    "https://www.googleapis.com/oauth2/v2/userinfo".to_string()
}

fn default_cors_allow_any() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            completion_timeout_secs: default_completion_timeout_secs(),
            session_ttl_hours: default_session_ttl_hours(),
            anthropic_base_url: default_anthropic_base_url(),
            userinfo_url: default_userinfo_url(),
            cors_allow_any: default_cors_allow_any(),
        }
    }
}
