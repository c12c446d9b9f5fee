//! Call-control webhook handlers.
//!
//! Each handler decodes a form-encoded provider callback into an
//! orchestrator event and answers with TwiML. Failures inside the session
//! core have already been turned into spoken lines by the time they get
//! here; the only error these handlers return is a post without a `CallSid`.

use crate::api::{ApiError, Twiml};
use crate::{twiml, AppState};
use axum::{
    extract::{Extension, Form},
    http::StatusCode,
};
use ivr_types::CallStatus;
use ivr_voice::CapturedSpeech;
use serde::Deserialize;
use std::sync::Arc;

/// Form body for `POST /voice/call`.
#[derive(Debug, Deserialize)]
pub struct CallForm {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
}

/// Form body for `POST /voice/speech`.
#[derive(Debug, Deserialize)]
pub struct SpeechForm {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
    /// Absent when the caller said nothing recognizable.
    #[serde(rename = "SpeechResult", default)]
    pub speech_result: String,
}

/// Form body for `POST /voice/recording`.
#[derive(Debug, Deserialize)]
pub struct RecordingForm {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
    #[serde(rename = "RecordingSid", default)]
    pub recording_sid: String,
}

/// Form body for `POST /voice/status`.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
    #[serde(rename = "CallStatus", default)]
    pub call_status: String,
}

fn require_call_sid(call_sid: &str) -> Result<&str, ApiError> {
    let call_sid = call_sid.trim();
    if call_sid.is_empty() {
        return Err(ApiError::BadRequest("missing CallSid".to_string()));
    }
    Ok(call_sid)
}

/// Handler for `POST /voice/call`.
///
/// Greets the caller and arms speech capture.
pub async fn call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<CallForm>,
) -> Result<Twiml, ApiError> {
    let call_sid = require_call_sid(&form.call_sid)?;
    let instruction = state.orchestrator.call_started(call_sid).await;
    Ok(Twiml(twiml::render(&instruction, &state.voice)))
}

/// Handler for `POST /voice/speech`.
///
/// Carries the provider's transcript of the last utterance.
pub async fn speech_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<SpeechForm>,
) -> Result<Twiml, ApiError> {
    let call_sid = require_call_sid(&form.call_sid)?;
    let instruction = state
        .orchestrator
        .speech_captured(call_sid, CapturedSpeech::Transcript(form.speech_result))
        .await;
    Ok(Twiml(twiml::render(&instruction, &state.voice)))
}

/// Handler for `POST /voice/recording`.
///
/// Carries a recording reference whose transcript is polled for.
pub async fn recording_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<RecordingForm>,
) -> Result<Twiml, ApiError> {
    let call_sid = require_call_sid(&form.call_sid)?;
    let instruction = state
        .orchestrator
        .speech_captured(call_sid, CapturedSpeech::Reference(form.recording_sid))
        .await;
    Ok(Twiml(twiml::render(&instruction, &state.voice)))
}

/// Handler for `POST /voice/status`.
///
/// Terminal statuses tear the session down. Always `204 No Content`.
pub async fn status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<StatusForm>,
) -> Result<StatusCode, ApiError> {
    let call_sid = require_call_sid(&form.call_sid)?;
    let status = CallStatus::parse(&form.call_status);
    if state.orchestrator.call_status(call_sid, &status).await {
        tracing::info!(call_sid = %call_sid, status = %form.call_status, "call ended");
    }
    Ok(StatusCode::NO_CONTENT)
}
