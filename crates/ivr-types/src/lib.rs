//! Shared types for the IVR voice session service.
//!
//! This crate provides the vocabulary used across the workspace: who spoke
//! ([`Role`]), what was said ([`Turn`]), what the telephony provider reported
//! about the call ([`CallStatus`]), and the declarative instruction handed
//! back to the call-control layer ([`CallInstruction`]).
//!
//! Nothing here performs I/O. Crates that talk to the outside world depend on
//! `ivr-types` for these definitions, never on each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod instruction;
pub use instruction::{
    CallInstruction, CaptureDirective, CaptureMode, RecordingCapture, SpeechCapture,
};

/// The speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The person on the phone line.
    Caller,
    /// The generated reply spoken back to the caller.
    Assistant,
}

impl Role {
    /// Returns the string label for this role.
    pub fn label(self) -> &'static str {
        match self {
            Self::Caller => "caller",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One recorded exchange unit: a caller utterance or an assistant reply.
///
/// Fields are private so a turn cannot change once it has been appended to a
/// session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    text: String,
    at: DateTime<Utc>,
}

impl Turn {
    /// Creates a turn stamped with the current time.
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self::at(role, text, Utc::now())
    }

    /// Creates a turn with an explicit timestamp.
    pub fn at(role: Role, text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            role,
            text: text.into(),
            at,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.at
    }
}

/// Call progress reported by the telephony provider's status callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Queued,
    Initiated,
    Ringing,
    InProgress,
    Completed,
    Busy,
    Failed,
    NoAnswer,
    Canceled,
    /// Any status string this service does not know about.
    #[serde(other)]
    Unknown,
}

impl CallStatus {
    /// Parses a provider status string. Unrecognized values map to
    /// [`CallStatus::Unknown`] rather than failing.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "queued" => Self::Queued,
            "initiated" => Self::Initiated,
            "ringing" => Self::Ringing,
            "in-progress" => Self::InProgress,
            "completed" => Self::Completed,
            "busy" => Self::Busy,
            "failed" => Self::Failed,
            "no-answer" => Self::NoAnswer,
            "canceled" => Self::Canceled,
            _ => Self::Unknown,
        }
    }

    /// Returns `true` if the call has ended and will produce no more events.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Busy | Self::Failed | Self::NoAnswer | Self::Canceled
        )
    }
}
