//! Fixtures shared by the session unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

use crate::backend::{AuthBackend, BackendError, Credentials, TokenGrant};

pub const NOW: i64 = 1_700_000_000_000;

/// A signed token for `role`; the client never checks the signature.
pub fn token_for(role: &str) -> String {
    token_with(role, "c@example.com")
}

pub fn token_with(role: &str, email: &str) -> String {
    encode(
        &Header::default(),
        &json!({
            "sub": email,
            "scope": format!("ROLE_{}", role.to_uppercase()),
            "userId": 7,
            "name": "Test User",
            "exp": NOW / 1000 + 3600
        }),
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .expect("Failed to create token")
}

pub fn grant(token: String, expires_in: i64) -> TokenGrant {
    TokenGrant {
        access_token: token,
        expires_in,
    }
}

/// Scripted backend that counts calls and can stall each refresh.
pub struct FakeBackend {
    refreshes: Mutex<VecDeque<Result<TokenGrant, BackendError>>>,
    pub refresh_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub logout_calls: AtomicUsize,
    login_result: Mutex<Option<Result<TokenGrant, BackendError>>>,
    logout_result: Result<(), BackendError>,
    delay: Duration,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            refreshes: Mutex::new(VecDeque::new()),
            refresh_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            login_result: Mutex::new(None),
            logout_result: Ok(()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failing_logout(mut self) -> Self {
        self.logout_result = Err(BackendError::Network("connection reset".into()));
        self
    }

    pub fn then_refresh(self, result: Result<TokenGrant, BackendError>) -> Self {
        self.refreshes.lock().unwrap().push_back(result);
        self
    }

    pub fn on_login(self, result: Result<TokenGrant, BackendError>) -> Self {
        *self.login_result.lock().unwrap() = Some(result);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AuthBackend for FakeBackend {
    async fn refresh(&self) -> Result<TokenGrant, BackendError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.refreshes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BackendError::Status(401)))
    }

    async fn login(&self, _credentials: &Credentials) -> Result<TokenGrant, BackendError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.login_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Err(BackendError::Status(401)))
    }

    async fn logout(&self) -> Result<(), BackendError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.logout_result.clone()
    }
}
