use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::guard::RouteGuard;
use super::hydration::{HydrationCoordinator, HydrationTask};
use super::persist::{establish, purge_legacy, teardown, ExpiryPolicy};
use super::refresh::RefreshCoordinator;
use super::sync::CrossTabSync;
use super::token_store::TokenStore;
use crate::backend::{AuthBackend, BackendError, Credentials, HttpAuthBackend, TokenGrant};
use crate::config::{GuardConfig, SessionConfig};
use crate::models::{ClaimsError, TokenIdentity};
use crate::store::{create_storage, Storage, StorageError};
use crate::utils::clock::{system_clock, Clock};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Claims(#[from] ClaimsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Everything one client context ("tab") needs for its session.
///
/// Replaces an ambient global: create one per context and pass it where
/// it is needed. Separate managers over `storage.tab()` handles behave like
/// separate browser tabs.
pub struct SessionManager {
    storage: Arc<dyn Storage>,
    backend: Arc<dyn AuthBackend>,
    store: Arc<TokenStore>,
    refresh: RefreshCoordinator,
    hydration: Arc<HydrationCoordinator>,
    policy: ExpiryPolicy,
    redirect_delay: Duration,
}

impl SessionManager {
    pub fn new(
        config: &SessionConfig,
        guard: &GuardConfig,
        storage: Arc<dyn Storage>,
        backend: Arc<dyn AuthBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(TokenStore::new(clock));
        let policy = ExpiryPolicy::from_config(config);
        let refresh =
            RefreshCoordinator::new(backend.clone(), storage.clone(), store.clone(), policy);
        let hydration = Arc::new(HydrationCoordinator::new(
            storage.clone(),
            store.clone(),
            refresh.clone(),
            config.keep_optimistic_on_transient,
        ));
        Self {
            storage,
            backend,
            store,
            refresh,
            hydration,
            policy,
            redirect_delay: Duration::from_millis(guard.redirect_delay_ms),
        }
    }

    /// Build a manager talking HTTP to `config.backend_url`, with storage from config.
    pub fn from_config(config: &SessionConfig, guard: &GuardConfig) -> Result<Self, SessionError> {
        let storage = create_storage(&config.storage)?;
        let backend = Arc::new(HttpAuthBackend::new(
            &config.backend_url,
            Duration::from_millis(config.request_timeout_ms),
        )?);
        Ok(Self::new(config, guard, storage, backend, system_clock()))
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn refresh(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    pub fn hydration(&self) -> &Arc<HydrationCoordinator> {
        &self.hydration
    }

    /// Start this load's hydration. See `HydrationCoordinator::spawn`.
    pub fn hydrate(&self) -> HydrationTask {
        self.hydration.spawn()
    }

    /// Follow session writes made by other tabs over the same storage.
    pub fn start_sync(&self) -> JoinHandle<()> {
        CrossTabSync::new(self.storage.clone(), self.store.clone()).spawn()
    }

    /// An auth guard using this manager's debounce delay.
    pub fn auth_guard(&self, fallback: &str) -> RouteGuard {
        RouteGuard::auth(fallback).with_redirect_delay(self.redirect_delay)
    }

    /// A guest guard using this manager's debounce delay.
    pub fn guest_guard(&self, fallback: &str) -> RouteGuard {
        RouteGuard::guest(fallback).with_redirect_delay(self.redirect_delay)
    }

    /// Local sign-in. The backend sets the refresh cookie; we keep the access token.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenIdentity, SessionError> {
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let grant = self.backend.login(&credentials).await?;
        let identity = self.install(&grant)?;
        info!(role = %identity.role, "Signed in '{}'", identity.user.email);
        Ok(identity)
    }

    /// Finish an OAuth round trip whose callback handed us an access token.
    pub fn complete_oauth(
        &self,
        access_token: &str,
        expires_in: i64,
    ) -> Result<TokenIdentity, SessionError> {
        let identity = self.install(&TokenGrant {
            access_token: access_token.to_string(),
            expires_in,
        })?;
        info!(role = %identity.role, "OAuth sign-in for '{}'", identity.user.email);
        Ok(identity)
    }

    fn install(&self, grant: &TokenGrant) -> Result<TokenIdentity, SessionError> {
        self.refresh.supersede(|| {
            if let Err(e) = purge_legacy(self.storage.as_ref()) {
                warn!("Failed to purge legacy session keys: {}", e);
            }
            match establish(self.storage.as_ref(), &self.store, &self.policy, grant) {
                Ok(identity) => Ok(identity),
                Err(e) => {
                    teardown(self.storage.as_ref(), &self.store);
                    Err(e.into())
                }
            }
        })
    }

    /// Sign out. Local state is cleared whatever the backend says, and a
    /// refresh still in flight is discarded when it lands.
    pub async fn logout(&self) {
        if let Err(e) = self.backend.logout().await {
            warn!("Backend logout failed, clearing local session anyway: {}", e);
        }
        self.refresh.supersede(|| {
            teardown(self.storage.as_ref(), &self.store);
            if let Err(e) = purge_legacy(self.storage.as_ref()) {
                warn!("Failed to purge legacy session keys: {}", e);
            }
        });
        info!("Signed out");
    }
}
