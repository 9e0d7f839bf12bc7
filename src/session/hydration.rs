//! Once-per-load reconciliation of the in-memory session with persisted
//! storage and the backend.
//!
//! `hydrate_optimistic` runs synchronously so the first render already sees
//! the persisted session. `verify` then asks the backend for the
//! authoritative answer and settles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::persist::{purge_legacy, restore_from_storage, teardown, RestoreOutcome};
use super::refresh::{RefreshCoordinator, RefreshOutcome};
use super::token_store::TokenStore;
use crate::store::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HydrationPhase {
    Cold,
    Optimistic,
    Verifying,
    SettledAuthenticated,
    SettledUnauthenticated,
}

impl HydrationPhase {
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            HydrationPhase::SettledAuthenticated | HydrationPhase::SettledUnauthenticated
        )
    }
}

pub struct HydrationCoordinator {
    storage: Arc<dyn Storage>,
    store: Arc<TokenStore>,
    refresh: RefreshCoordinator,
    phase: watch::Sender<HydrationPhase>,
    started: AtomicBool,
    cancelled: Arc<AtomicBool>,
    keep_optimistic_on_transient: bool,
}

impl HydrationCoordinator {
    pub fn new(
        storage: Arc<dyn Storage>,
        store: Arc<TokenStore>,
        refresh: RefreshCoordinator,
        keep_optimistic_on_transient: bool,
    ) -> Self {
        let (phase, _) = watch::channel(HydrationPhase::Cold);
        Self {
            storage,
            store,
            refresh,
            phase,
            started: AtomicBool::new(false),
            cancelled: Arc::new(AtomicBool::new(false)),
            keep_optimistic_on_transient,
        }
    }

    pub fn phase(&self) -> HydrationPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<HydrationPhase> {
        self.phase.subscribe()
    }

    /// Wait until this load has settled.
    pub async fn settled(&self) -> HydrationPhase {
        let mut rx = self.phase.subscribe();
        loop {
            let phase = *rx.borrow_and_update();
            if phase.is_settled() {
                return phase;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow();
            }
        }
    }

    /// Stop a pending verification from writing phase or session when it completes.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cold -> Optimistic. Returns whether a persisted session was restored.
    /// Does nothing once the coordinator has left Cold.
    pub fn hydrate_optimistic(&self) -> bool {
        if self.phase() != HydrationPhase::Cold {
            return self.store.is_authenticated();
        }
        if let Err(e) = purge_legacy(self.storage.as_ref()) {
            warn!("Failed to purge legacy session keys: {}", e);
        }
        let outcome = restore_from_storage(self.storage.as_ref(), &self.store, true);
        debug!("Optimistic hydration: {:?}", outcome);
        self.phase.send_replace(HydrationPhase::Optimistic);
        outcome == RestoreOutcome::Restored
    }

    /// Verifying -> Settled. Always consults the refresh coordinator once.
    pub async fn verify(&self) -> HydrationPhase {
        self.phase.send_replace(HydrationPhase::Verifying);
        let outcome = self.refresh.refresh_outcome_unless(&self.cancelled).await;

        if self.is_cancelled() {
            debug!("Hydration cancelled; discarding verification result");
            return self.phase();
        }

        let authenticated = match &outcome {
            RefreshOutcome::Refreshed(_) => self.store.is_authenticated(),
            RefreshOutcome::Rejected(_) | RefreshOutcome::Malformed(_) => false,
            RefreshOutcome::Transient(reason) => {
                let keep = self.keep_optimistic_on_transient && self.store.is_authenticated();
                if keep {
                    info!("Verification failed transiently ({}); keeping optimistic session", reason);
                }
                keep
            }
            RefreshOutcome::Discarded => self.store.is_authenticated(),
        };

        let settled = if authenticated {
            HydrationPhase::SettledAuthenticated
        } else {
            if outcome != RefreshOutcome::Discarded {
                teardown(self.storage.as_ref(), &self.store);
            }
            HydrationPhase::SettledUnauthenticated
        };
        self.phase.send_replace(settled);
        info!("Session hydration settled: {:?}", settled);
        settled
    }

    /// Full cycle, at most once per coordinator. Later calls return the current phase.
    pub async fn run(&self) -> HydrationPhase {
        if self.started.swap(true, Ordering::SeqCst) {
            return self.phase();
        }
        self.hydrate_optimistic();
        self.verify().await
    }

    /// Run the optimistic step now, verify in the background.
    ///
    /// The optimistic write is complete when this returns. Dropping the
    /// returned task without joining it cancels the verification.
    pub fn spawn(self: &Arc<Self>) -> HydrationTask {
        if self.started.swap(true, Ordering::SeqCst) {
            return HydrationTask {
                coordinator: self.clone(),
                handle: None,
            };
        }
        self.hydrate_optimistic();
        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.verify().await });
        HydrationTask {
            coordinator: self.clone(),
            handle: Some(handle),
        }
    }
}

/// Background verification started by `HydrationCoordinator::spawn`.
pub struct HydrationTask {
    coordinator: Arc<HydrationCoordinator>,
    handle: Option<JoinHandle<HydrationPhase>>,
}

impl HydrationTask {
    pub async fn join(mut self) -> HydrationPhase {
        match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(phase) => phase,
                Err(e) => {
                    warn!("Hydration task failed: {}", e);
                    self.coordinator.phase()
                }
            },
            None => self.coordinator.phase(),
        }
    }

    pub fn cancel(&self) {
        self.coordinator.cancel();
    }
}

impl Drop for HydrationTask {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.coordinator.cancel();
        }
    }
}
