//! Per-call session orchestration.
//!
//! A call moves through a small state machine ([`machine`]) while the
//! [`Orchestrator`] greets the caller, turns captured speech into text,
//! queries the language model with the full conversation, and speaks the
//! reply back. Conversation state lives in the [`SessionStore`], one
//! independently locked [`Session`] per call id.
//!
//! Every event produces a [`ivr_types::CallInstruction`]: either something to
//! say followed by the next capture, or a hangup. Failures along the way are
//! turned into spoken lines, never into errors for the call-control layer.

pub mod error;
pub mod intent;
pub mod machine;
pub mod orchestrator;
pub mod store;

pub use error::SessionError;
pub use intent::is_farewell;
pub use machine::{CallEvent, CallState};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use store::{Session, SessionEntry, SessionHandle, SessionStore};
