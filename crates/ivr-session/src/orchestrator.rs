//! Turn orchestration.
//!
//! The [`Orchestrator`] answers each call-control event with a
//! [`CallInstruction`]. It owns the session store, resolves captured speech
//! through the configured [`Transcriber`], queries the model through the
//! [`LlmDispatcher`], and mirrors every turn into the activity log.
//!
//! One event holds its session's lock from start to finish, so a call's
//! events are handled strictly one after another. Anything produced after the
//! session has been removed (the caller hung up mid-wait) is dropped.

use std::sync::Arc;
use std::time::Duration;

use ivr_observe::ActivityLog;
use ivr_types::{
    CallInstruction, CallStatus, CaptureDirective, CaptureMode, RecordingCapture, Role,
    SpeechCapture,
};
use ivr_voice::{CapturedSpeech, LlmDispatcher, Transcriber, VoiceError};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::intent::is_farewell;
use crate::machine::{CallEvent, CallState};
use crate::store::{Session, SessionStore};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an intelligent IVR assistant. Answer the \
caller's questions accurately and briefly, in plain sentences suitable for being read aloud. \
If you do not know the answer, say so and suggest who the caller could contact.";
pub const DEFAULT_GREETING: &str =
    "Welcome to the automated assistant. What can I help you with today?";
pub const DEFAULT_REPROMPT: &str = "I couldn't understand that. Could you please repeat?";
pub const DEFAULT_TIMEOUT_REPLY: &str =
    "I'm sorry, I didn't catch that in time. Could you please say it again?";
pub const DEFAULT_FAREWELL_REPLY: &str = "Thank you for calling. Goodbye!";
pub const DEFAULT_SPEECH_ACTION: &str = "/voice/speech";
pub const DEFAULT_RECORDING_ACTION: &str = "/voice/recording";

/// Fixed lines and capture settings used by the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub system_prompt: String,
    pub greeting: String,
    pub reprompt: String,
    pub timeout_reply: String,
    pub farewell_reply: String,
    /// Spoken after every generated reply, if set.
    pub follow_up: Option<String>,
    pub hangup_on_farewell: bool,
    pub speech_action: String,
    pub recording_action: String,
    pub speech: SpeechCapture,
    pub recording: RecordingCapture,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            greeting: DEFAULT_GREETING.to_string(),
            reprompt: DEFAULT_REPROMPT.to_string(),
            timeout_reply: DEFAULT_TIMEOUT_REPLY.to_string(),
            farewell_reply: DEFAULT_FAREWELL_REPLY.to_string(),
            follow_up: None,
            hangup_on_farewell: false,
            speech_action: DEFAULT_SPEECH_ACTION.to_string(),
            recording_action: DEFAULT_RECORDING_ACTION.to_string(),
            speech: SpeechCapture::default(),
            recording: RecordingCapture::default(),
        }
    }
}

pub struct Orchestrator {
    store: Arc<SessionStore>,
    transcriber: Transcriber,
    dispatcher: LlmDispatcher,
    activity: Option<Arc<ActivityLog>>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        transcriber: Transcriber,
        dispatcher: LlmDispatcher,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store: Arc::new(SessionStore::new()),
            transcriber,
            dispatcher,
            activity: None,
            settings,
        }
    }

    /// Mirrors turns into `activity` and clears it once no call is active.
    pub fn with_activity(mut self, activity: Arc<ActivityLog>) -> Self {
        self.activity = Some(activity);
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Where and how the next utterance is captured, per the transcription
    /// strategy.
    pub fn capture_directive(&self) -> CaptureDirective {
        if self.transcriber.is_polling() {
            CaptureDirective {
                action: self.settings.recording_action.clone(),
                mode: CaptureMode::Recording(self.settings.recording.clone()),
            }
        } else {
            CaptureDirective {
                action: self.settings.speech_action.clone(),
                mode: CaptureMode::Speech(self.settings.speech.clone()),
            }
        }
    }

    /// Greets the caller and arms capture. A repeat delivery re-greets
    /// without touching history.
    pub async fn call_started(&self, call_id: &str) -> CallInstruction {
        let handle = self.store.get_or_create(call_id);
        let mut session = handle.lock().await;
        if !handle.is_live() {
            return ended();
        }
        session.touch();

        advance(&mut session, CallEvent::CallStarted);
        advance(&mut session, CallEvent::CaptureArmed);
        info!(call_sid = %call_id, "call started");

        self.speak(&mut session, vec![self.settings.greeting.clone()], false)
    }

    /// Handles one captured utterance and returns what to say next.
    ///
    /// Never fails: an unusable utterance re-prompts, an exhausted transcript
    /// budget apologizes, and a failed completion speaks the fallback reply.
    pub async fn speech_captured(&self, call_id: &str, captured: CapturedSpeech) -> CallInstruction {
        let handle = self.store.get_or_create(call_id);
        let mut session = handle.lock().await;
        if !handle.is_live() {
            return ended();
        }
        session.touch();

        if let Err(e) = self.check_capture(&captured) {
            debug!(call_sid = %call_id, error = %e, "re-prompting");
            return self.reprompt(&mut session);
        }

        advance(
            &mut session,
            CallEvent::Utterance {
                empty: false,
                needs_polling: captured.needs_polling(),
            },
        );

        let text = match self.resolve(&captured).await {
            Ok(text) => text,
            Err(SessionError::TranscriptionTimeout { attempts }) => {
                warn!(call_sid = %call_id, attempts, "transcript never arrived");
                if !handle.is_live() {
                    return ended();
                }
                advance(&mut session, CallEvent::BudgetExhausted);
                advance(&mut session, CallEvent::CaptureArmed);
                return self.speak(
                    &mut session,
                    vec![self.settings.timeout_reply.clone()],
                    false,
                );
            }
            Err(e) => {
                warn!(call_sid = %call_id, error = %e, "could not resolve utterance");
                if !handle.is_live() {
                    return ended();
                }
                session.recover();
                return self.reprompt(&mut session);
            }
        };

        if !handle.is_live() {
            debug!(call_sid = %call_id, "call ended while resolving transcript, dropping it");
            return ended();
        }
        if session.state() == CallState::ResolvingTranscript {
            advance(&mut session, CallEvent::TranscriptReady);
        }

        let farewell =
            self.settings.hangup_on_farewell && is_farewell(&text, session.last_spoken());

        session.push_turn(Role::Caller, text.as_str());
        self.record(call_id, Role::Caller, &text).await;
        info!(call_sid = %call_id, utterance = %text, "caller turn recorded");

        if farewell {
            let closing = self.settings.farewell_reply.clone();
            session.push_turn(Role::Assistant, closing.as_str());
            self.record(call_id, Role::Assistant, &closing).await;
            advance(&mut session, CallEvent::CallTerminated);
            drop(session);

            info!(call_sid = %call_id, "caller said goodbye, hanging up");
            self.terminate(call_id).await;
            return CallInstruction::Hangup {
                segments: vec![closing],
            };
        }

        let reply = self
            .dispatcher
            .query(&self.settings.system_prompt, session.turns())
            .await;

        if !handle.is_live() {
            debug!(call_sid = %call_id, "call ended while generating, dropping reply");
            return ended();
        }

        advance(&mut session, CallEvent::ReplyReady);
        session.push_turn(Role::Assistant, reply.as_str());
        self.record(call_id, Role::Assistant, &reply).await;
        advance(&mut session, CallEvent::ReplySpoken);

        let mut segments = vec![reply];
        segments.extend(self.settings.follow_up.iter().cloned());
        self.speak(&mut session, segments, true)
    }

    /// Applies a call-status report. Only terminal statuses act.
    ///
    /// Returns `true` if the status was terminal.
    pub async fn call_status(&self, call_id: &str, status: &CallStatus) -> bool {
        if !status.is_terminal() {
            debug!(call_sid = %call_id, status = ?status, "ignoring non-terminal status");
            return false;
        }
        self.terminate(call_id).await;
        true
    }

    /// Removes the call's session. Safe to call any number of times.
    ///
    /// The activity log is shared by every call, so it is only cleared once
    /// the last active call has ended.
    ///
    /// Returns `true` if a session was removed.
    pub async fn terminate(&self, call_id: &str) -> bool {
        let removed = match self.store.take(call_id) {
            Some(handle) => {
                // A session mid-event notices it is no longer live instead.
                if let Ok(mut session) = handle.try_lock() {
                    if session.state() != CallState::Terminated {
                        advance(&mut session, CallEvent::CallTerminated);
                    }
                }
                info!(call_sid = %call_id, "session removed");
                true
            }
            None => {
                debug!(call_sid = %call_id, "no session to remove");
                false
            }
        };

        if let Some(activity) = self.activity.as_ref().filter(|_| self.store.is_empty()) {
            if let Err(e) = activity.clear(call_id).await {
                warn!(call_sid = %call_id, error = %e, "failed to clear activity log");
            }
        }
        removed
    }

    /// Drops sessions idle for at least `max_idle`.
    pub fn evict_idle(&self, max_idle: Duration) -> Vec<String> {
        let evicted = self.store.evict_idle(max_idle);
        for call_id in &evicted {
            info!(call_sid = %call_id, idle_seconds = max_idle.as_secs(), "evicted idle session");
        }
        evicted
    }

    fn check_capture(&self, captured: &CapturedSpeech) -> Result<(), SessionError> {
        if captured.is_empty() {
            return Err(SessionError::Input("nothing was captured".to_string()));
        }
        if captured.needs_polling() && !self.transcriber.is_polling() {
            return Err(SessionError::Input(
                "recording received but transcript polling is disabled".to_string(),
            ));
        }
        Ok(())
    }

    async fn resolve(&self, captured: &CapturedSpeech) -> Result<String, SessionError> {
        match self.transcriber.resolve(captured).await {
            Ok(text) if text.trim().is_empty() => {
                Err(SessionError::Input("blank transcript".to_string()))
            }
            Ok(text) => Ok(text),
            Err(VoiceError::TranscriptionTimeout { attempts }) => {
                Err(SessionError::TranscriptionTimeout { attempts })
            }
            Err(e) => Err(SessionError::Input(e.to_string())),
        }
    }

    fn reprompt(&self, session: &mut Session) -> CallInstruction {
        advance(
            session,
            CallEvent::Utterance {
                empty: true,
                needs_polling: false,
            },
        );
        advance(session, CallEvent::CaptureArmed);
        self.speak(session, vec![self.settings.reprompt.clone()], false)
    }

    fn speak(
        &self,
        session: &mut Session,
        segments: Vec<String>,
        barge_in: bool,
    ) -> CallInstruction {
        session.set_spoken(&segments);
        CallInstruction::Respond {
            segments,
            barge_in,
            capture: self.capture_directive(),
        }
    }

    async fn record(&self, call_id: &str, role: Role, text: &str) {
        if let Some(activity) = &self.activity {
            if let Err(e) = activity.record(call_id, role, text).await {
                warn!(call_sid = %call_id, error = %e, "failed to write activity log");
            }
        }
    }
}

/// Applies `event`, resetting a confused session to `Listening` and trying
/// once more.
fn advance(session: &mut Session, event: CallEvent) {
    if let Err(e) = session.apply(event) {
        warn!(call_sid = %session.call_id(), error = %e, "unexpected event");
        session.recover();
        if let Err(e) = session.apply(event) {
            warn!(call_sid = %session.call_id(), error = %e, "event dropped");
        }
    }
}

/// The answer for an event that arrives after its call has ended.
fn ended() -> CallInstruction {
    CallInstruction::Hangup {
        segments: Vec::new(),
    }
}
