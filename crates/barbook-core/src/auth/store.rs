//! Process-wide session state with change notifications.

use tokio::sync::watch;
use tracing::debug;

use super::{Session, SessionState};

/// Single source of truth for "is anyone signed in, and as whom".
///
/// Constructed once at process start and handed to whoever needs it;
/// clones share the same underlying state. Reads never block. Mutations
/// are atomic from the perspective of observers: a watcher sees either
/// the old state or the new one, never anything in between.
#[derive(Clone)]
pub struct SessionStore {
    state: watch::Sender<SessionState>,
}

impl SessionStore {
    /// Create a store in the `Unknown` state, to be resolved by session
    /// restoration before anything renders.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self { state }
    }

    /// Latest lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The live session, if a user is signed in.
    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Replace the current session, notifying watchers.
    pub fn set_session(&self, session: Session) {
        debug!(user = %session.user.email, "Session set");
        self.state.send_replace(SessionState::Authenticated(session));
    }

    /// Drop to `Anonymous`. Idempotent: clearing an absent session
    /// changes nothing and wakes nobody.
    pub fn clear(&self) {
        self.state.send_if_modified(|state| {
            if matches!(state, SessionState::Anonymous) {
                false
            } else {
                debug!("Session cleared");
                *state = SessionState::Anonymous;
                true
            }
        });
    }

    /// Resolve `Unknown` to `Anonymous` when restoration found nothing.
    /// No-op once the state is already resolved.
    pub(crate) fn resolve_anonymous(&self) {
        self.state.send_if_modified(|state| {
            if matches!(state, SessionState::Unknown) {
                *state = SessionState::Anonymous;
                true
            } else {
                false
            }
        });
    }

    /// Subscribe to session changes. The watcher starts out at the
    /// current state and wakes on every transition after that.
    pub fn subscribe(&self) -> SessionWatcher {
        SessionWatcher {
            rx: self.state.subscribe(),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for observing session transitions.
pub struct SessionWatcher {
    rx: watch::Receiver<SessionState>,
}

impl SessionWatcher {
    /// Latest state, without waiting.
    pub fn current(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    /// Wait for the next transition after the last one this watcher
    /// observed, returning the new state. `None` once every handle to
    /// the store is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
