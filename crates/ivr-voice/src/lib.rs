//! Speech and language plumbing for the IVR service.
//!
//! Two outbound concerns live here, each behind a small async trait so the
//! session core can be exercised without a network:
//!
//! - **Transcription**: turning a capture event into text, either directly
//!   (the provider recognized the speech) or by polling the provider's
//!   transcription resource for a recording reference.
//! - **Completion**: sending the conversation to a hosted chat model and
//!   downgrading any failure to a fixed, speakable apology.

pub mod config;
pub mod error;
pub mod llm;
pub mod transcription;

pub use config::{LlmConfig, TranscriptionConfig, TranscriptionMode, TwilioConfig};
pub use error::VoiceError;
pub use llm::{
    build_messages, ChatMessage, ChatRole, CompletionBackend, HttpCompletionBackend,
    LlmDispatcher, FALLBACK_REPLY,
};
pub use transcription::{
    is_recording_reference, CapturedSpeech, Transcriber, TranscriptLookup, TranscriptPoller,
    TranscriptionRequest, TwilioTranscriptLookup,
};
