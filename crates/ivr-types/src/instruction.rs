//! Declarative instructions returned to the call-control layer.
//!
//! The session core never speaks to the telephony provider directly. It
//! answers every event with a [`CallInstruction`] describing what the caller
//! should hear next and how the next utterance should be captured. The server
//! renders it into the provider's markup.

use serde::{Deserialize, Serialize};

/// Speech-capture settings passed through to the provider unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechCapture {
    /// Recognition model hint (e.g. `experimental_conversations`).
    pub speech_model: String,
    /// End-of-speech timeout: seconds, or `auto`.
    pub speech_timeout: String,
    /// Request the provider's enhanced recognizer.
    pub enhanced: bool,
    /// BCP-47 language tag, if not the provider default.
    pub language: Option<String>,
    /// Comma-separated phrase hints.
    pub hints: Option<String>,
}

impl Default for SpeechCapture {
    fn default() -> Self {
        Self {
            speech_model: "experimental_conversations".to_string(),
            speech_timeout: "auto".to_string(),
            enhanced: true,
            language: None,
            hints: None,
        }
    }
}

/// Recording settings for the reference-id (polling) transcription flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingCapture {
    /// Seconds of silence that end the recording.
    pub timeout_seconds: u32,
    /// Hard cap on recording length.
    pub max_length_seconds: u32,
    pub play_beep: bool,
    pub finish_on_key: String,
}

impl Default for RecordingCapture {
    fn default() -> Self {
        Self {
            timeout_seconds: 2,
            max_length_seconds: 10,
            play_beep: true,
            finish_on_key: "#".to_string(),
        }
    }
}

/// How the next utterance is captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CaptureMode {
    /// Provider-side recognition; the transcript arrives with the callback.
    Speech(SpeechCapture),
    /// Record audio; the callback carries a reference to poll for the transcript.
    Recording(RecordingCapture),
}

/// Where and how the next captured utterance is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDirective {
    /// Endpoint the provider calls with the captured utterance.
    pub action: String,
    pub mode: CaptureMode,
}

/// What the call-control layer should do in response to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallInstruction {
    /// Speak the segments in order, then capture the next utterance.
    Respond {
        segments: Vec<String>,
        /// Whether the caller may interrupt playback by speaking.
        barge_in: bool,
        capture: CaptureDirective,
    },
    /// Speak the segments, then end the call.
    Hangup { segments: Vec<String> },
}

impl CallInstruction {
    /// Returns the spoken segments, in playback order.
    pub fn segments(&self) -> &[String] {
        match self {
            Self::Respond { segments, .. } | Self::Hangup { segments } => segments,
        }
    }

    pub fn is_hangup(&self) -> bool {
        matches!(self, Self::Hangup { .. })
    }

    /// Returns the capture directive, or `None` for a hangup.
    pub fn capture(&self) -> Option<&CaptureDirective> {
        match self {
            Self::Respond { capture, .. } => Some(capture),
            Self::Hangup { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respond_exposes_segments_and_capture() {
        let instruction = CallInstruction::Respond {
            segments: vec!["Hello".to_string()],
            barge_in: true,
            capture: CaptureDirective {
                action: "/voice/speech".to_string(),
                mode: CaptureMode::Speech(SpeechCapture::default()),
            },
        };
        assert_eq!(instruction.segments(), ["Hello".to_string()]);
        assert!(!instruction.is_hangup());
        assert_eq!(instruction.capture().unwrap().action, "/voice/speech");
    }

    #[test]
    fn hangup_has_no_capture() {
        let instruction = CallInstruction::Hangup {
            segments: vec!["Goodbye".to_string()],
        };
        assert!(instruction.is_hangup());
        assert!(instruction.capture().is_none());
    }

    #[test]
    fn serializes_with_kind_tag() {
        let instruction = CallInstruction::Hangup { segments: vec![] };
        let json = serde_json::to_value(&instruction).unwrap();
        assert_eq!(json["kind"], "hangup");
    }
}
