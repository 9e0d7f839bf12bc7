use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use super::persist::{establish, teardown, ExpiryPolicy};
use super::token_store::TokenStore;
use crate::backend::{AuthBackend, BackendError};
use crate::store::Storage;
use crate::utils::log_throttle::LogThrottle;

/// How one refresh attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new token was installed.
    Refreshed(String),
    /// No response, a server error or an unreadable body. Session left untouched.
    Transient(String),
    /// 401/403. Session cleared.
    Rejected(u16),
    /// The backend issued a token we cannot decode. Session cleared.
    Malformed(String),
    /// The session was replaced or the caller cancelled while the request
    /// was in flight. Nothing was written.
    Discarded,
}

impl RefreshOutcome {
    pub fn token(&self) -> Option<&str> {
        match self {
            RefreshOutcome::Refreshed(token) => Some(token),
            _ => None,
        }
    }

    /// Whether the outcome invalidated the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RefreshOutcome::Rejected(_) | RefreshOutcome::Malformed(_)
        )
    }
}

type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

struct Inner {
    backend: Arc<dyn AuthBackend>,
    storage: Arc<dyn Storage>,
    store: Arc<TokenStore>,
    policy: ExpiryPolicy,
    in_flight: Mutex<Option<(u64, SharedRefresh)>>,
    next_id: AtomicU64,
    epoch: Mutex<u64>,
    throttle: LogThrottle,
}

/// Exchanges the ambient refresh cookie for a new access token, with at most
/// one network call in flight no matter how many callers ask.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        storage: Arc<dyn Storage>,
        store: Arc<TokenStore>,
        policy: ExpiryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                storage,
                store,
                policy,
                in_flight: Mutex::new(None),
                next_id: AtomicU64::new(0),
                epoch: Mutex::new(0),
                throttle: LogThrottle::new(Duration::from_secs(60)),
            }),
        }
    }

    /// The new access token, or `None` if the refresh failed for any reason.
    pub async fn refresh(&self) -> Option<String> {
        self.refresh_outcome().await.token().map(str::to_string)
    }

    /// Join the refresh in flight, or start one.
    pub async fn refresh_outcome(&self) -> RefreshOutcome {
        self.join_or_start(None).await
    }

    /// Like `refresh_outcome`, but a refresh started here writes nothing once
    /// `cancelled` is set. A refresh already in flight is joined as is.
    pub async fn refresh_outcome_unless(&self, cancelled: &Arc<AtomicBool>) -> RefreshOutcome {
        self.join_or_start(Some(cancelled.clone())).await
    }

    /// Run `replace` as the new owner of the session. Any refresh in flight
    /// is discarded instead of writing over what `replace` leaves behind.
    pub fn supersede<T>(&self, replace: impl FnOnce() -> T) -> T {
        let mut epoch = self.inner.epoch();
        *epoch += 1;
        debug!("Session superseded (epoch {})", *epoch);
        replace()
    }

    async fn join_or_start(&self, cancelled: Option<Arc<AtomicBool>>) -> RefreshOutcome {
        let pending = {
            let mut slot = self.inner.slot();
            match slot.as_ref() {
                Some((id, pending)) => {
                    debug!("Joining in-flight refresh #{}", id);
                    pending.clone()
                }
                None => {
                    let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
                    let inner = self.inner.clone();
                    let pending = async move {
                        let outcome = inner.run(id, cancelled).await;
                        inner.finish(id);
                        outcome
                    }
                    .boxed()
                    .shared();
                    *slot = Some((id, pending.clone()));
                    pending
                }
            }
        };
        pending.await
    }

    pub fn is_in_flight(&self) -> bool {
        self.inner.slot().is_some()
    }
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, Option<(u64, SharedRefresh)>> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn epoch(&self) -> MutexGuard<'_, u64> {
        match self.epoch.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Clear the in-flight marker, whatever the outcome, unless a newer attempt owns it.
    fn finish(&self, id: u64) {
        let mut slot = self.slot();
        if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
            *slot = None;
        }
    }

    async fn run(&self, id: u64, cancelled: Option<Arc<AtomicBool>>) -> RefreshOutcome {
        let started_in = *self.epoch();
        debug!("Starting refresh #{}", id);
        let response = self.backend.refresh().await;

        // Held until the outcome is written so `supersede` cannot interleave.
        let epoch = self.epoch();
        if *epoch != started_in {
            info!("Session changed during refresh #{}; discarding the response", id);
            return RefreshOutcome::Discarded;
        }
        if cancelled.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            debug!("Refresh #{} cancelled; discarding the response", id);
            return RefreshOutcome::Discarded;
        }

        match response {
            Ok(grant) => match establish(self.storage.as_ref(), &self.store, &self.policy, &grant) {
                Ok(identity) => {
                    info!(
                        role = %identity.role,
                        expires_in = grant.expires_in,
                        "Access token refreshed"
                    );
                    RefreshOutcome::Refreshed(grant.access_token)
                }
                Err(e) => {
                    warn!("Refresh returned an undecodable token: {}", e);
                    teardown(self.storage.as_ref(), &self.store);
                    RefreshOutcome::Malformed(e.to_string())
                }
            },
            Err(e) if e.is_unauthorized() => {
                info!("Refresh rejected ({}); clearing session", e);
                teardown(self.storage.as_ref(), &self.store);
                match e {
                    BackendError::Status(status) => RefreshOutcome::Rejected(status),
                    _ => RefreshOutcome::Rejected(401),
                }
            }
            Err(e) => {
                if let Some(suppressed) = self.throttle.should_emit("refresh.transient") {
                    warn!(suppressed, "Refresh failed transiently: {}", e);
                }
                RefreshOutcome::Transient(e.to_string())
            }
        }
    }
}
