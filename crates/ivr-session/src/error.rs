use crate::machine::{CallEvent, CallState};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Nothing usable was captured. The caller is asked to repeat.
    #[error("unusable utterance: {0}")]
    Input(String),

    /// The poll budget ran out before a transcript was available.
    #[error("transcript not ready after {attempts} attempts")]
    TranscriptionTimeout { attempts: u32 },

    #[error("no transition from {from:?} on {event:?}")]
    InvalidTransition { from: CallState, event: CallEvent },
}
