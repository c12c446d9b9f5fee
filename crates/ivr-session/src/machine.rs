//! The per-call state machine.
//!
//! [`next`] is the whole transition table. Sessions call it through
//! [`crate::Session::apply`], so a state only changes along an edge listed
//! here.
//!
//! | From | Event | To |
//! |------|-------|----|
//! | `Idle`, `Listening` | `CallStarted` | `Greeting` |
//! | `Greeting` | `CaptureArmed` | `Listening` |
//! | `Idle`, `Listening` | `Utterance` (empty) | `Greeting` |
//! | `Idle`, `Listening` | `Utterance` (text) | `Generating` |
//! | `Idle`, `Listening` | `Utterance` (reference) | `ResolvingTranscript` |
//! | `ResolvingTranscript` | `TranscriptReady` | `Generating` |
//! | `ResolvingTranscript` | `BudgetExhausted` | `Greeting` |
//! | `Generating` | `ReplyReady` | `Responding` |
//! | `Responding` | `ReplySpoken` | `Listening` |
//! | any but `Terminated` | `CallTerminated` | `Terminated` |
//!
//! `Idle` accepts utterances so that a session recreated for a stale or
//! duplicate event carries on instead of failing. A repeated `CallStarted`
//! while `Listening` re-greets.

use crate::error::SessionError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Idle,
    Greeting,
    Listening,
    ResolvingTranscript,
    Generating,
    Responding,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallEvent {
    CallStarted,
    CaptureArmed,
    Utterance { empty: bool, needs_polling: bool },
    TranscriptReady,
    BudgetExhausted,
    ReplyReady,
    ReplySpoken,
    CallTerminated,
}

/// Returns the state reached from `from` on `event`.
///
/// # Errors
///
/// Returns `SessionError::InvalidTransition` for any edge not in the table.
pub fn next(from: CallState, event: CallEvent) -> Result<CallState, SessionError> {
    use CallEvent as E;
    use CallState as S;

    let to = match (from, event) {
        (S::Terminated, _) => None,
        (_, E::CallTerminated) => Some(S::Terminated),
        (S::Idle | S::Listening, E::CallStarted) => Some(S::Greeting),
        (S::Greeting, E::CaptureArmed) => Some(S::Listening),
        (S::Idle | S::Listening, E::Utterance { empty: true, .. }) => Some(S::Greeting),
        (S::Idle | S::Listening, E::Utterance { needs_polling: true, .. }) => {
            Some(S::ResolvingTranscript)
        }
        (S::Idle | S::Listening, E::Utterance { .. }) => Some(S::Generating),
        (S::ResolvingTranscript, E::TranscriptReady) => Some(S::Generating),
        (S::ResolvingTranscript, E::BudgetExhausted) => Some(S::Greeting),
        (S::Generating, E::ReplyReady) => Some(S::Responding),
        (S::Responding, E::ReplySpoken) => Some(S::Listening),
        _ => None,
    };

    to.ok_or(SessionError::InvalidTransition { from, event })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: CallEvent = CallEvent::Utterance {
        empty: false,
        needs_polling: false,
    };
    const REFERENCE: CallEvent = CallEvent::Utterance {
        empty: false,
        needs_polling: true,
    };
    const EMPTY: CallEvent = CallEvent::Utterance {
        empty: true,
        needs_polling: false,
    };

    fn walk(start: CallState, events: &[CallEvent]) -> CallState {
        events
            .iter()
            .fold(start, |state, event| next(state, *event).unwrap())
    }

    #[test]
    fn callback_round_trip_returns_to_listening() {
        let state = walk(
            CallState::Idle,
            &[
                CallEvent::CallStarted,
                CallEvent::CaptureArmed,
                TEXT,
                CallEvent::ReplyReady,
                CallEvent::ReplySpoken,
            ],
        );
        assert_eq!(state, CallState::Listening);
    }

    #[test]
    fn poll_round_trip_passes_through_resolving() {
        let state = walk(CallState::Listening, &[REFERENCE]);
        assert_eq!(state, CallState::ResolvingTranscript);
        let state = walk(
            state,
            &[
                CallEvent::TranscriptReady,
                CallEvent::ReplyReady,
                CallEvent::ReplySpoken,
            ],
        );
        assert_eq!(state, CallState::Listening);
    }

    #[test]
    fn empty_utterance_goes_back_to_greeting() {
        assert_eq!(next(CallState::Listening, EMPTY).unwrap(), CallState::Greeting);
    }

    #[test]
    fn exhausted_budget_re_arms_capture() {
        let state = walk(
            CallState::ResolvingTranscript,
            &[CallEvent::BudgetExhausted, CallEvent::CaptureArmed],
        );
        assert_eq!(state, CallState::Listening);
    }

    #[test]
    fn idle_session_accepts_utterance() {
        assert_eq!(next(CallState::Idle, TEXT).unwrap(), CallState::Generating);
    }

    #[test]
    fn duplicate_call_start_re_greets() {
        assert_eq!(
            next(CallState::Listening, CallEvent::CallStarted).unwrap(),
            CallState::Greeting
        );
    }

    #[test]
    fn termination_from_any_live_state() {
        for state in [
            CallState::Idle,
            CallState::Greeting,
            CallState::Listening,
            CallState::ResolvingTranscript,
            CallState::Generating,
            CallState::Responding,
        ] {
            assert_eq!(
                next(state, CallEvent::CallTerminated).unwrap(),
                CallState::Terminated
            );
        }
    }

    #[test]
    fn terminated_is_final() {
        let err = next(CallState::Terminated, CallEvent::CallStarted).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                from: CallState::Terminated,
                event: CallEvent::CallStarted,
            }
        );
        assert!(next(CallState::Terminated, CallEvent::CallTerminated).is_err());
    }

    #[test]
    fn out_of_order_events_are_rejected() {
        assert!(next(CallState::Listening, CallEvent::ReplyReady).is_err());
        assert!(next(CallState::Generating, TEXT).is_err());
        assert!(next(CallState::Idle, CallEvent::TranscriptReady).is_err());
        assert!(next(CallState::Responding, CallEvent::CaptureArmed).is_err());
    }
}
