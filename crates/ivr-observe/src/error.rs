//! Error types for the activity log.

/// Errors that can occur while writing the activity log.
#[derive(Debug, thiserror::Error)]
pub enum ObserveError {
    /// The log file could not be created, written, or truncated.
    #[error("activity log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An entry could not be serialised.
    #[error("activity serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
