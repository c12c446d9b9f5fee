//! Activity entry and stream event types.

use chrono::{DateTime, Utc};
use ivr_types::Role;
use serde::{Deserialize, Serialize};

/// Marker written before caller lines. Viewers key their styling on it.
pub const CALLER_MARKER: &str = "🎤";
/// Marker written before assistant lines.
pub const ASSISTANT_MARKER: &str = "🤖";

/// One utterance or reply, as recorded in the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// Monotonically increasing per log, starting at 1.
    pub seq: u64,
    pub call_id: String,
    pub role: Role,
    pub text: String,
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEntry {
    /// Renders the entry as a single log line, without the trailing newline.
    ///
    /// Embedded line breaks are flattened so one entry is always one line.
    pub fn to_line(&self) -> String {
        let (marker, label) = match self.role {
            Role::Caller => (CALLER_MARKER, "Caller said"),
            Role::Assistant => (ASSISTANT_MARKER, "Assistant replied"),
        };
        let text: String = self
            .text
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "[INFO] {} - {} {} ({}): {}",
            self.occurred_at.format("%Y-%m-%d %H:%M:%S"),
            marker,
            label,
            self.call_id,
            text
        )
    }
}

/// Events pushed to live subscribers of the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityEvent {
    /// A new entry was appended.
    Entry(ActivityEntry),
    /// The log was truncated because a call ended.
    Cleared { call_id: String },
}
