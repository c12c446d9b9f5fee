use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_LLM_ENDPOINT: &str = "https://api.mistral.ai/v1/chat/completions";
pub const DEFAULT_LLM_MODEL: &str = "mistral-small";
pub const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";

fn default_llm_endpoint() -> String {
    DEFAULT_LLM_ENDPOINT.to_string()
}

fn default_llm_model() -> String {
    DEFAULT_LLM_MODEL.to_string()
}

fn default_llm_timeout_ms() -> u64 {
    5_000
}

fn default_twilio_api_base() -> String {
    DEFAULT_TWILIO_API_BASE.to_string()
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_attempts() -> u32 {
    10
}

/// Settings for the hosted chat-completion backend.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    /// Upper bound on one completion request. Default: 5000.
    #[serde(default = "default_llm_timeout_ms")]
    pub timeout_ms: u64,
    /// Inline system prompt. Takes precedence over `system_prompt_path`.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// File holding the system prompt.
    #[serde(default)]
    pub system_prompt_path: Option<String>,
    /// Spoken when the backend fails. Defaults to [`crate::FALLBACK_REPLY`].
    #[serde(default)]
    pub fallback_reply: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: String::new(),
            timeout_ms: default_llm_timeout_ms(),
            system_prompt: None,
            system_prompt_path: None,
            fallback_reply: None,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("timeout_ms", &self.timeout_ms)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("system_prompt_path", &self.system_prompt_path)
            .field("fallback_reply", &self.fallback_reply)
            .finish()
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Which transcription strategy the service runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionMode {
    /// The provider recognizes speech and posts the transcript with the callback.
    #[default]
    Callback,
    /// The provider posts a recording reference; the transcript is polled for.
    Poll,
}

/// Settings for transcript acquisition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    #[serde(default)]
    pub mode: TranscriptionMode,
    /// Delay before each status lookup. Default: 1000.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Lookups allowed before giving up. Default: 10.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            mode: TranscriptionMode::default(),
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl TranscriptionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Credentials for the telephony provider's REST API.
#[derive(Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub account_sid: String,
    #[serde(default, skip_serializing)]
    pub auth_token: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            api_base: default_twilio_api_base(),
            account_sid: String::new(),
            auth_token: String::new(),
        }
    }
}

impl fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("api_base", &self.api_base)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .finish()
    }
}

impl TwilioConfig {
    pub fn new(
        api_base: impl Into<String>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty()
    }
}
