use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("upstream returned status {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream did not answer within {} ms", .0.as_millis())]
    Timeout(Duration),

    #[error("failed to decode upstream response: {0}")]
    Decode(String),

    #[error("completion contained no text")]
    EmptyCompletion,

    #[error("transcript not ready after {attempts} attempts")]
    TranscriptionTimeout { attempts: u32 },

    #[error("transcript lookup error: {0}")]
    Lookup(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
