//! Call-id → session registry.
//!
//! The index is a `std::sync::RwLock<HashMap>`: every acquisition is a brief
//! lookup, insert, or removal that never spans an `.await`. Each session sits
//! behind its own `tokio::sync::Mutex`, which event handling holds across the
//! transcript and completion waits so that one call's events are applied one
//! at a time while other calls proceed independently.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ivr_types::{Role, Turn};
use tokio::sync::{Mutex, MutexGuard, TryLockError};
use tokio::time::Instant;

use crate::error::SessionError;
use crate::machine::{self, CallEvent, CallState};

/// Conversation and machine state for one call.
#[derive(Debug)]
pub struct Session {
    call_id: String,
    turns: Vec<Turn>,
    state: CallState,
    created_at: DateTime<Utc>,
    last_activity: Instant,
    last_spoken: Option<String>,
}

impl Session {
    fn new(call_id: String) -> Self {
        Self {
            call_id,
            turns: Vec::new(),
            state: CallState::Idle,
            created_at: Utc::now(),
            last_activity: Instant::now(),
            last_spoken: None,
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since the last event touched this session.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Moves the machine along `event`. The state is unchanged on error.
    pub fn apply(&mut self, event: CallEvent) -> Result<CallState, SessionError> {
        let to = machine::next(self.state, event)?;
        tracing::trace!(call_sid = %self.call_id, from = ?self.state, to = ?to, "state transition");
        self.state = to;
        Ok(to)
    }

    /// Forces the session back to `Listening` after an event could not be
    /// applied. History is untouched.
    pub fn recover(&mut self) {
        tracing::warn!(call_sid = %self.call_id, from = ?self.state, "resetting session to listening");
        self.state = CallState::Listening;
    }

    /// Appends a turn to the end of the history.
    pub fn push_turn(&mut self, role: Role, text: impl Into<String>) -> &Turn {
        self.turns.push(Turn::new(role, text));
        self.last_activity = Instant::now();
        &self.turns[self.turns.len() - 1]
    }

    /// Remembers everything said to the caller in the latest response,
    /// including lines that are not part of the conversation history.
    pub fn set_spoken(&mut self, segments: &[String]) {
        self.last_spoken = Some(segments.join(" "));
    }

    /// What the caller heard last, if anything was spoken yet.
    pub fn last_spoken(&self) -> Option<&str> {
        self.last_spoken.as_deref()
    }
}

/// A registered session plus its liveness flag.
///
/// The flag is cleared when the session is removed from the store. Work that
/// finishes after that (a late transcript or completion) checks it and drops
/// its result.
#[derive(Debug)]
pub struct SessionEntry {
    live: AtomicBool,
    session: Mutex<Session>,
}

impl SessionEntry {
    fn new(call_id: String) -> Self {
        Self {
            live: AtomicBool::new(true),
            session: Mutex::new(Session::new(call_id)),
        }
    }

    /// Waits for exclusive access to the session.
    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().await
    }

    pub fn try_lock(&self) -> Result<MutexGuard<'_, Session>, TryLockError> {
        self.session.try_lock()
    }

    /// Returns `false` once the session has been removed from the store.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn retire(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

pub type SessionHandle = Arc<SessionEntry>;

/// Registry of live sessions keyed by call id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the session for `call_id`, creating an empty one if the id is
    /// unknown. Never fails.
    pub fn get_or_create(&self, call_id: &str) -> SessionHandle {
        if let Some(handle) = self.get(call_id) {
            return handle;
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(call_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(call_sid = %call_id, "session created");
                Arc::new(SessionEntry::new(call_id.to_string()))
            })
            .clone()
    }

    /// Returns the session for `call_id` without creating one.
    pub fn get(&self, call_id: &str) -> Option<SessionHandle> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(call_id)
            .cloned()
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.get(call_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a turn to an existing session.
    ///
    /// Returns `false`, writing nothing, if the call id has no live session.
    pub async fn append_turn(&self, call_id: &str, role: Role, text: &str) -> bool {
        let Some(handle) = self.get(call_id) else {
            tracing::debug!(call_sid = %call_id, "dropping turn for absent session");
            return false;
        };
        let mut session = handle.lock().await;
        if !handle.is_live() {
            tracing::debug!(call_sid = %call_id, "dropping turn for removed session");
            return false;
        }
        session.push_turn(role, text);
        true
    }

    /// Returns a copy of the call's turns in the order they were appended.
    /// Unknown call ids yield an empty history.
    pub async fn history(&self, call_id: &str) -> Vec<Turn> {
        match self.get(call_id) {
            Some(handle) => handle.lock().await.turns().to_vec(),
            None => Vec::new(),
        }
    }

    /// Removes and retires the session. Returns the removed handle, if any.
    pub fn take(&self, call_id: &str) -> Option<SessionHandle> {
        let removed = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(call_id);
        if let Some(handle) = &removed {
            handle.retire();
        }
        removed
    }

    /// Removes the session. Removing an unknown call id is a no-op.
    ///
    /// Returns `true` if a session was removed.
    pub fn remove(&self, call_id: &str) -> bool {
        self.take(call_id).is_some()
    }

    /// Removes every session idle for at least `max_idle`.
    ///
    /// Sessions busy with an event are skipped. Returns the evicted call ids.
    pub fn evict_idle(&self, max_idle: Duration) -> Vec<String> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let mut evicted = Vec::new();

        sessions.retain(|call_id, handle| {
            let idle = match handle.try_lock() {
                Ok(session) => session.idle_for() >= max_idle,
                Err(_) => false,
            };
            if idle {
                handle.retire();
                evicted.push(call_id.clone());
            }
            !idle
        });

        evicted
    }
}
