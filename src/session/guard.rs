use std::time::Duration;

use tracing::debug;

use super::hydration::{HydrationCoordinator, HydrationPhase};
use super::token_store::TokenStore;
use crate::models::{Role, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardMode {
    /// Only signed-in users (optionally of certain roles) may see the view.
    Auth,
    /// Only signed-out users may see the view (sign-in, sign-up).
    Guest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Loading,
    Render,
    Redirect(String),
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    mode: GuardMode,
    fallback: String,
    allowed_roles: Vec<Role>,
    role_fallback: String,
    redirect_delay: Duration,
}

impl RouteGuard {
    pub fn new(mode: GuardMode, fallback: impl Into<String>) -> Self {
        let fallback = fallback.into();
        Self {
            mode,
            role_fallback: fallback.clone(),
            fallback,
            allowed_roles: Vec::new(),
            redirect_delay: Duration::from_millis(100),
        }
    }

    pub fn auth(fallback: impl Into<String>) -> Self {
        Self::new(GuardMode::Auth, fallback)
    }

    pub fn guest(fallback: impl Into<String>) -> Self {
        Self::new(GuardMode::Guest, fallback)
    }

    /// Restrict an auth guard to `roles`; other signed-in users go to `fallback`.
    pub fn with_roles(mut self, roles: &[Role], fallback: impl Into<String>) -> Self {
        self.allowed_roles = roles.to_vec();
        self.role_fallback = fallback.into();
        self
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    pub fn redirect_delay(&self) -> Duration {
        self.redirect_delay
    }

    pub fn mode(&self) -> GuardMode {
        self.mode
    }

    /// Decide from a single observation. Pure.
    pub fn evaluate(&self, phase: HydrationPhase, session: &Session, now_ms: i64) -> GuardDecision {
        if !phase.is_settled() {
            return GuardDecision::Loading;
        }
        let authenticated = session.is_authenticated_at(now_ms);
        match self.mode {
            GuardMode::Auth if !authenticated => GuardDecision::Redirect(self.fallback.clone()),
            GuardMode::Auth => {
                let role_ok = self.allowed_roles.is_empty()
                    || session
                        .role
                        .map_or(false, |role| self.allowed_roles.contains(&role));
                if role_ok {
                    GuardDecision::Render
                } else {
                    GuardDecision::Redirect(self.role_fallback.clone())
                }
            }
            GuardMode::Guest if authenticated => GuardDecision::Redirect(self.fallback.clone()),
            GuardMode::Guest => GuardDecision::Render,
        }
    }

    pub fn evaluate_now(&self, hydration: &HydrationCoordinator, store: &TokenStore) -> GuardDecision {
        self.evaluate(hydration.phase(), &store.snapshot(), store.now_ms())
    }

    /// Wait for hydration to settle, then decide. A redirect is only
    /// committed if it still holds after the debounce delay.
    pub async fn resolve(&self, hydration: &HydrationCoordinator, store: &TokenStore) -> GuardDecision {
        hydration.settled().await;
        let decision = self.evaluate_now(hydration, store);
        if !matches!(decision, GuardDecision::Redirect(_)) || self.redirect_delay.is_zero() {
            return decision;
        }
        tokio::time::sleep(self.redirect_delay).await;
        let confirmed = self.evaluate_now(hydration, store);
        if confirmed != decision {
            debug!("Redirect {:?} withdrawn after debounce: {:?}", decision, confirmed);
        }
        confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use crate::session::persist::ExpiryPolicy;
    use crate::session::refresh::RefreshCoordinator;
    use crate::session::test_support::{token_for, FakeBackend, NOW};
    use crate::store::MemoryStorage;
    use crate::utils::clock::ManualClock;
    use std::sync::Arc;

    fn signed_in(role: Role) -> Session {
        Session {
            access_token: Some("t".into()),
            token_expires_at: Some(NOW + 1_000),
            role: Some(role),
            user: None,
        }
    }

    #[test]
    fn test_loading_until_settled() {
        let guard = RouteGuard::auth("/sign-in");
        for phase in [
            HydrationPhase::Cold,
            HydrationPhase::Optimistic,
            HydrationPhase::Verifying,
        ] {
            assert_eq!(
                guard.evaluate(phase, &signed_in(Role::Candidate), NOW),
                GuardDecision::Loading
            );
        }
    }

    #[test]
    fn test_auth_guard_decisions() {
        let guard = RouteGuard::auth("/sign-in");
        let settled = HydrationPhase::SettledAuthenticated;
        assert_eq!(
            guard.evaluate(settled, &signed_in(Role::Candidate), NOW),
            GuardDecision::Render
        );
        assert_eq!(
            guard.evaluate(settled, &Session::default(), NOW),
            GuardDecision::Redirect("/sign-in".into())
        );
        assert_eq!(
            guard.evaluate(settled, &signed_in(Role::Candidate), NOW + 1_000),
            GuardDecision::Redirect("/sign-in".into()),
            "expired session"
        );
    }

    #[test]
    fn test_role_restricted_guard() {
        let guard = RouteGuard::auth("/sign-in").with_roles(&[Role::Admin], "/");
        let settled = HydrationPhase::SettledAuthenticated;
        assert_eq!(
            guard.evaluate(settled, &signed_in(Role::Admin), NOW),
            GuardDecision::Render
        );
        assert_eq!(
            guard.evaluate(settled, &signed_in(Role::Recruiter), NOW),
            GuardDecision::Redirect("/".into())
        );
    }

    #[test]
    fn test_guest_guard_decisions() {
        let guard = RouteGuard::guest("/dashboard");
        let settled = HydrationPhase::SettledUnauthenticated;
        assert_eq!(
            guard.evaluate(settled, &Session::default(), NOW),
            GuardDecision::Render
        );
        assert_eq!(
            guard.evaluate(settled, &signed_in(Role::Recruiter), NOW),
            GuardDecision::Redirect("/dashboard".into())
        );
    }

    fn hydration(backend: FakeBackend) -> (Arc<TokenStore>, Arc<HydrationCoordinator>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = Arc::new(TokenStore::new(ManualClock::new(NOW)));
        let refresh = RefreshCoordinator::new(
            backend.into_arc(),
            storage.clone(),
            store.clone(),
            ExpiryPolicy::default(),
        );
        let hydration = Arc::new(HydrationCoordinator::new(storage, store.clone(), refresh, true));
        (store, hydration)
    }

    #[tokio::test]
    async fn test_resolve_waits_for_settle() {
        let (store, hydration) = hydration(
            FakeBackend::new()
                .with_delay(Duration::from_millis(20))
                .then_refresh(Err(BackendError::Status(401))),
        );
        let guard = RouteGuard::auth("/sign-in").with_redirect_delay(Duration::from_millis(5));

        let task = hydration.spawn();
        assert_eq!(guard.evaluate_now(&hydration, &store), GuardDecision::Loading);
        assert_eq!(
            guard.resolve(&hydration, &store).await,
            GuardDecision::Redirect("/sign-in".into())
        );
        task.join().await;
    }

    #[tokio::test]
    async fn test_redirect_is_withdrawn_if_state_recovers_during_debounce() {
        let (store, hydration) = hydration(
            FakeBackend::new().then_refresh(Err(BackendError::Status(401))),
        );
        hydration.run().await;
        let guard = RouteGuard::auth("/sign-in").with_redirect_delay(Duration::from_millis(30));

        let store_for_login = store.clone();
        let login = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            store_for_login.set_from_tokens(
                token_for("candidate"),
                NOW + 60_000,
                Some(Role::Candidate),
                None,
            );
        });

        assert_eq!(guard.resolve(&hydration, &store).await, GuardDecision::Render);
        login.await.unwrap();
    }
}
