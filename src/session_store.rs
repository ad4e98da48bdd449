//! # Wizard Session Store
//!
//! In-memory map from Telegram user to their [`WizardSession`]. The store never
//! awaits while holding its lock: callers take what they need out of a session,
//! run the async work, then come back and check the session's generation before
//! applying the result.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use teloxide::types::UserId;

use crate::dialogue::{WizardSession, WizardStep};

#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, WizardSession>>,
    next_generation: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a generation id for a new session
    pub fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Insert a session, returning the one it replaced
    pub fn insert(&self, session: WizardSession) -> Option<WizardSession> {
        self.sessions.lock().insert(session.user_id, session)
    }

    pub fn remove(&self, user_id: UserId) -> Option<WizardSession> {
        self.sessions.lock().remove(&user_id)
    }

    /// Remove the user's session only if it is still the given generation
    pub fn remove_if_generation(&self, user_id: UserId, generation: u64) -> Option<WizardSession> {
        let mut sessions = self.sessions.lock();
        match sessions.get(&user_id) {
            Some(session) if session.generation == generation => sessions.remove(&user_id),
            _ => None,
        }
    }

    /// Run `f` against the user's session, if any
    pub fn with_session<R>(
        &self,
        user_id: UserId,
        f: impl FnOnce(&mut WizardSession) -> R,
    ) -> Option<R> {
        self.sessions.lock().get_mut(&user_id).map(f)
    }

    /// Run `f` against the user's session only if it is still the given generation
    pub fn with_generation<R>(
        &self,
        user_id: UserId,
        generation: u64,
        f: impl FnOnce(&mut WizardSession) -> R,
    ) -> Option<R> {
        self.sessions
            .lock()
            .get_mut(&user_id)
            .filter(|session| session.generation == generation)
            .map(f)
    }

    pub fn step(&self, user_id: UserId) -> Option<WizardStep> {
        self.sessions.lock().get(&user_id).map(|session| session.step)
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.sessions.lock().contains_key(&user_id)
    }

    /// Number of active wizards
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Remove every session, returning them so their login handles can be released
    pub fn drain(&self) -> Vec<WizardSession> {
        self.sessions.lock().drain().map(|(_, session)| session).collect()
    }
}
