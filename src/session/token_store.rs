use std::sync::Arc;

use tokio::sync::watch;

use crate::models::{Role, Session, SessionUser};
use crate::utils::clock::Clock;

/// Single source of truth for one client context's session.
///
/// Writers replace the whole `Session`; readers either take synchronous
/// snapshots or `subscribe()` to be woken on every change. Nothing here
/// touches persisted storage.
pub struct TokenStore {
    state: watch::Sender<Session>,
    clock: Arc<dyn Clock>,
}

impl TokenStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self { state, clock }
    }

    /// Overwrite every field. No validation is performed.
    pub fn set_from_tokens(
        &self,
        access_token: impl Into<String>,
        token_expires_at: i64,
        role: Option<Role>,
        user: Option<SessionUser>,
    ) {
        self.state.send_replace(Session {
            access_token: Some(access_token.into()),
            token_expires_at: Some(token_expires_at),
            role,
            user,
        });
    }

    /// Reset to the unauthenticated defaults.
    pub fn clear(&self) {
        self.state.send_if_modified(|session| {
            if *session == Session::default() {
                false
            } else {
                *session = Session::default();
                true
            }
        });
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().access_token.clone()
    }

    pub fn token_expires_at(&self) -> Option<i64> {
        self.state.borrow().token_expires_at
    }

    pub fn role(&self) -> Option<Role> {
        self.state.borrow().role
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.state.borrow().user.clone()
    }

    /// Derived: a token is present and unexpired right now.
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated_at(self.now_ms())
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}
