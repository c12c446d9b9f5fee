//! Conversation activity log for the IVR service.
//!
//! Every caller utterance and assistant reply is appended, tagged by role, to
//! a plain-text log file as it happens, one line per entry. The file is meant
//! to be tailed by an external viewer; the same entries are also broadcast to
//! in-process subscribers (the server exposes them as an SSE stream).
//!
//! | Role | Marker | Example line |
//! |------|--------|--------------|
//! | caller | `🎤` | `[INFO] 2025-03-04 10:15:00 - 🎤 Caller said (CA1): What are your hours?` |
//! | assistant | `🤖` | `[INFO] 2025-03-04 10:15:02 - 🤖 Assistant replied (CA1): We open at 8 AM.` |
//!
//! When a call ends the log is truncated, so a viewer only ever shows the
//! current conversation.

mod error;
mod event;
mod log;

pub use error::ObserveError;
pub use event::{ActivityEntry, ActivityEvent, ASSISTANT_MARKER, CALLER_MARKER};
pub use log::{ActivityLog, DEFAULT_BROADCAST_CAPACITY};

#[cfg(test)]
mod tests;
