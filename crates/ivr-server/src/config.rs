//! Server configuration loading from file and environment variables.

use ivr_observe::DEFAULT_BROADCAST_CAPACITY;
use ivr_session::orchestrator::{
    DEFAULT_FAREWELL_REPLY, DEFAULT_GREETING, DEFAULT_REPROMPT, DEFAULT_SYSTEM_PROMPT,
    DEFAULT_TIMEOUT_REPLY,
};
use ivr_session::OrchestratorSettings;
use ivr_types::{RecordingCapture, SpeechCapture};
use ivr_voice::{LlmConfig, TranscriptionConfig, TranscriptionMode, TwilioConfig};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Chat-completion backend.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Transcript acquisition strategy.
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Telephony provider REST credentials (poll mode only).
    #[serde(default)]
    pub twilio: TwilioConfig,

    /// Speech and recording capture settings passed to the provider.
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Spoken lines and session lifecycle.
    #[serde(default)]
    pub session: SessionConfig,

    /// Conversation activity log.
    #[serde(default)]
    pub activity: ActivityConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "ivr_session=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Capture settings. Speech fields are passed through to the provider as-is.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_speech_model")]
    pub speech_model: String,
    #[serde(default = "default_speech_timeout")]
    pub speech_timeout: String,
    #[serde(default = "default_true")]
    pub enhanced: bool,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub hints: Option<String>,
    /// Text-to-speech voice for every spoken line.
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_record_timeout_seconds")]
    pub record_timeout_seconds: u32,
    #[serde(default = "default_record_max_length_seconds")]
    pub record_max_length_seconds: u32,
    #[serde(default = "default_true")]
    pub play_beep: bool,
    #[serde(default = "default_finish_on_key")]
    pub finish_on_key: String,
}

/// Fixed lines and session lifecycle settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_reprompt")]
    pub reprompt: String,
    /// Spoken when a transcript never arrived.
    #[serde(default = "default_timeout_reply")]
    pub timeout_reply: String,
    /// Spoken after each generated reply, if set.
    #[serde(default)]
    pub follow_up: Option<String>,
    /// Sessions untouched for this long are dropped. 0 disables eviction.
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,
    /// Hang up when the caller says goodbye instead of asking the model.
    #[serde(default)]
    pub hangup_on_farewell: bool,
    #[serde(default = "default_farewell_reply")]
    pub farewell_reply: String,
}

/// Activity log settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityConfig {
    /// Path of the tailable conversation log.
    #[serde(default = "default_activity_path")]
    pub path: String,

    /// Buffered events per live subscriber before it starts missing entries.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_speech_model() -> String {
    SpeechCapture::default().speech_model
}

fn default_speech_timeout() -> String {
    SpeechCapture::default().speech_timeout
}

fn default_voice() -> String {
    "Polly.Joanna".to_string()
}

fn default_record_timeout_seconds() -> u32 {
    RecordingCapture::default().timeout_seconds
}

fn default_record_max_length_seconds() -> u32 {
    RecordingCapture::default().max_length_seconds
}

fn default_finish_on_key() -> String {
    RecordingCapture::default().finish_on_key
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

fn default_reprompt() -> String {
    DEFAULT_REPROMPT.to_string()
}

fn default_timeout_reply() -> String {
    DEFAULT_TIMEOUT_REPLY.to_string()
}

fn default_farewell_reply() -> String {
    DEFAULT_FAREWELL_REPLY.to_string()
}

fn default_idle_timeout_seconds() -> u64 {
    900
}

fn default_activity_path() -> String {
    "logs/conversation.log".to_string()
}

fn default_broadcast_capacity() -> usize {
    DEFAULT_BROADCAST_CAPACITY
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            speech_model: default_speech_model(),
            speech_timeout: default_speech_timeout(),
            enhanced: true,
            language: None,
            hints: None,
            voice: default_voice(),
            record_timeout_seconds: default_record_timeout_seconds(),
            record_max_length_seconds: default_record_max_length_seconds(),
            play_beep: true,
            finish_on_key: default_finish_on_key(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            reprompt: default_reprompt(),
            timeout_reply: default_timeout_reply(),
            follow_up: None,
            idle_timeout_seconds: default_idle_timeout_seconds(),
            hangup_on_farewell: false,
            farewell_reply: default_farewell_reply(),
        }
    }
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            path: default_activity_path(),
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

impl CaptureConfig {
    pub fn speech(&self) -> SpeechCapture {
        SpeechCapture {
            speech_model: self.speech_model.clone(),
            speech_timeout: self.speech_timeout.clone(),
            enhanced: self.enhanced,
            language: self.language.clone(),
            hints: self.hints.clone(),
        }
    }

    pub fn recording(&self) -> RecordingCapture {
        RecordingCapture {
            timeout_seconds: self.record_timeout_seconds,
            max_length_seconds: self.record_max_length_seconds,
            play_beep: self.play_beep,
            finish_on_key: self.finish_on_key.clone(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to read the system prompt file.
    #[error("failed to read system prompt from {path}: {source}")]
    PromptRead {
        path: String,
        source: std::io::Error,
    },

    /// The configuration cannot run the service.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    /// Checks that the service can start with this configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first missing or unusable
    /// setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "llm.api_key is not set (use IVR_LLM_API_KEY or MISTRAL_API_KEY)".to_string(),
            ));
        }
        if self.llm.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.endpoint is empty".to_string()));
        }
        if self.llm.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "llm.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.transcription.mode == TranscriptionMode::Poll {
            if !self.twilio.is_configured() {
                return Err(ConfigError::Invalid(
                    "transcription.mode = \"poll\" requires twilio.account_sid and twilio.auth_token"
                        .to_string(),
                ));
            }
            if self.transcription.max_attempts == 0 {
                return Err(ConfigError::Invalid(
                    "transcription.max_attempts must be at least 1".to_string(),
                ));
            }
        }
        for (key, line) in [
            ("session.greeting", &self.session.greeting),
            ("session.reprompt", &self.session.reprompt),
            ("session.timeout_reply", &self.session.timeout_reply),
        ] {
            if line.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} is empty", key)));
            }
        }
        Ok(())
    }

    /// Returns the system prompt: inline text, else the prompt file, else the
    /// built-in prompt.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::PromptRead` if `llm.system_prompt_path` is set
    /// but unreadable.
    pub fn system_prompt(&self) -> Result<String, ConfigError> {
        if let Some(prompt) = self.llm.system_prompt.as_deref() {
            if !prompt.trim().is_empty() {
                return Ok(prompt.trim().to_string());
            }
        }
        if let Some(path) = self.llm.system_prompt_path.as_deref() {
            let prompt = std::fs::read_to_string(path).map_err(|source| ConfigError::PromptRead {
                path: path.to_string(),
                source,
            })?;
            return Ok(prompt.trim().to_string());
        }
        Ok(DEFAULT_SYSTEM_PROMPT.to_string())
    }

    /// Builds orchestrator settings around an already resolved system prompt.
    pub fn orchestrator_settings(&self, system_prompt: String) -> OrchestratorSettings {
        OrchestratorSettings {
            system_prompt,
            greeting: self.session.greeting.clone(),
            reprompt: self.session.reprompt.clone(),
            timeout_reply: self.session.timeout_reply.clone(),
            farewell_reply: self.session.farewell_reply.clone(),
            follow_up: self
                .session
                .follow_up
                .clone()
                .filter(|line| !line.trim().is_empty()),
            hangup_on_farewell: self.session.hangup_on_farewell,
            speech: self.capture.speech(),
            recording: self.capture.recording(),
            ..OrchestratorSettings::default()
        }
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `IVR_HOST` overrides `server.host`
/// - `IVR_PORT` overrides `server.port`
/// - `IVR_LOG_LEVEL` overrides `logging.level`
/// - `IVR_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `IVR_LLM_ENDPOINT` overrides `llm.endpoint`
/// - `IVR_LLM_MODEL` overrides `llm.model`
/// - `IVR_LLM_API_KEY` (or `MISTRAL_API_KEY`) overrides `llm.api_key`
/// - `IVR_LLM_TIMEOUT_MS` overrides `llm.timeout_ms`
/// - `IVR_TRANSCRIPTION_MODE` overrides `transcription.mode` ("callback" or "poll")
/// - `IVR_TWILIO_ACCOUNT_SID` overrides `twilio.account_sid`
/// - `IVR_TWILIO_AUTH_TOKEN` overrides `twilio.auth_token`
/// - `IVR_ACTIVITY_PATH` overrides `activity.path`
/// - `IVR_IDLE_TIMEOUT_SECONDS` overrides `session.idle_timeout_seconds`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit variable source.
pub fn load_config_with<F>(path: Option<&str>, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, env);
    Ok(config)
}

fn apply_env_overrides<F>(config: &mut Config, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(parsed) = env("IVR_HOST").and_then(|v| v.parse().ok()) {
        config.server.host = parsed;
    }
    if let Some(parsed) = env("IVR_PORT").and_then(|v| v.parse().ok()) {
        config.server.port = parsed;
    }
    if let Some(level) = env("IVR_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env("IVR_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(endpoint) = env("IVR_LLM_ENDPOINT") {
        config.llm.endpoint = endpoint;
    }
    if let Some(model) = env("IVR_LLM_MODEL") {
        config.llm.model = model;
    }
    if let Some(key) = env("IVR_LLM_API_KEY").or_else(|| env("MISTRAL_API_KEY")) {
        config.llm.api_key = key;
    }
    if let Some(parsed) = env("IVR_LLM_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
        config.llm.timeout_ms = parsed;
    }
    if let Some(mode) = env("IVR_TRANSCRIPTION_MODE") {
        match mode.trim().to_ascii_lowercase().as_str() {
            "callback" => config.transcription.mode = TranscriptionMode::Callback,
            "poll" => config.transcription.mode = TranscriptionMode::Poll,
            other => tracing::warn!(value = other, "ignoring unknown IVR_TRANSCRIPTION_MODE"),
        }
    }
    if let Some(sid) = env("IVR_TWILIO_ACCOUNT_SID") {
        config.twilio.account_sid = sid;
    }
    if let Some(token) = env("IVR_TWILIO_AUTH_TOKEN") {
        config.twilio.auth_token = token;
    }
    if let Some(path) = env("IVR_ACTIVITY_PATH") {
        config.activity.path = path;
    }
    if let Some(parsed) = env("IVR_IDLE_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
        config.session.idle_timeout_seconds = parsed;
    }
}
