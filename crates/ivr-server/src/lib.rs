//! IVR server library logic.

pub mod api;
pub mod api_sse;
pub mod api_voice;
pub mod background;
pub mod config;
pub mod twiml;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use config::{Config, ConfigError};
use ivr_observe::{ActivityLog, ObserveError};
use ivr_session::Orchestrator;
use ivr_voice::{
    HttpCompletionBackend, LlmDispatcher, Transcriber, TranscriptPoller, TranscriptionMode,
    TwilioTranscriptLookup, VoiceError,
};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session orchestration for every live call.
    pub orchestrator: Arc<Orchestrator>,
    /// Conversation activity log (file + live broadcast).
    pub activity: Arc<ActivityLog>,
    /// Text-to-speech voice used in rendered TwiML.
    pub voice: String,
}

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to set up voice backends: {0}")]
    Voice(#[from] VoiceError),

    #[error("failed to open activity log: {0}")]
    Activity(#[from] ObserveError),
}

impl AppState {
    /// Builds the backends, orchestrator, and activity log described by
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns `StartupError` if the configuration is invalid, a backend
    /// cannot be built, or the activity log cannot be opened.
    pub async fn from_config(config: &Config) -> Result<Self, StartupError> {
        config.validate()?;
        let system_prompt = config.system_prompt()?;

        let backend = HttpCompletionBackend::new(&config.llm)?;
        let mut dispatcher = LlmDispatcher::new(Arc::new(backend), config.llm.timeout());
        if let Some(fallback) = &config.llm.fallback_reply {
            dispatcher = dispatcher.with_fallback(fallback.clone());
        }

        let transcriber = match config.transcription.mode {
            TranscriptionMode::Callback => Transcriber::Callback,
            TranscriptionMode::Poll => {
                let lookup = TwilioTranscriptLookup::new(config.twilio.clone())?;
                Transcriber::Poll(TranscriptPoller::new(
                    Arc::new(lookup),
                    config.transcription.poll_interval(),
                    config.transcription.max_attempts,
                ))
            }
        };

        let activity = Arc::new(
            ActivityLog::open(&config.activity.path, config.activity.broadcast_capacity).await?,
        );

        let orchestrator = Orchestrator::new(
            transcriber,
            dispatcher,
            config.orchestrator_settings(system_prompt),
        )
        .with_activity(activity.clone());

        tracing::info!(
            mode = ?config.transcription.mode,
            model = %config.llm.model,
            activity_log = %config.activity.path,
            "voice session service configured"
        );

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            activity,
            voice: config.capture.voice.clone(),
        })
    }
}

/// Maximum request body size (64 KiB). Webhook form posts are small.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health(Extension(state): Extension<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "active_sessions": state.orchestrator.store().len()
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/voice/call", post(api_voice::call_handler))
        .route("/voice/speech", post(api_voice::speech_handler))
        .route("/voice/recording", post(api_voice::recording_handler))
        .route("/voice/status", post(api_voice::status_handler))
        .route("/events/activity", get(api_sse::activity_stream_handler))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
