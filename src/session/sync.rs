use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::persist::{restore_from_storage, RestoreOutcome, WATCHED_KEYS};
use super::token_store::TokenStore;
use crate::store::{Storage, StorageEvent};

/// Keeps this tab's token store in line with writes made by other tabs.
///
/// No conflict resolution: whatever landed last in storage is what every
/// tab converges to.
#[derive(Clone)]
pub struct CrossTabSync {
    storage: Arc<dyn Storage>,
    store: Arc<TokenStore>,
}

impl CrossTabSync {
    pub fn new(storage: Arc<dyn Storage>, store: Arc<TokenStore>) -> Self {
        Self { storage, store }
    }

    /// Another tab touched one of the session keys.
    pub fn is_relevant(&self, event: &StorageEvent) -> bool {
        event.source != self.storage.source_id() && WATCHED_KEYS.contains(&event.key.as_str())
    }

    /// Re-read storage if `event` concerns us. Returns what the re-read concluded.
    pub fn handle_event(&self, event: &StorageEvent) -> Option<RestoreOutcome> {
        if !self.is_relevant(event) {
            return None;
        }
        let outcome = self.resync();
        debug!("Storage change on '{}' from another tab: {:?}", event.key, outcome);
        Some(outcome)
    }

    /// Repopulate or clear the store from storage, leaving storage itself alone.
    pub fn resync(&self) -> RestoreOutcome {
        restore_from_storage(self.storage.as_ref(), &self.store, false)
    }

    /// Listen until the storage's event channel closes.
    ///
    /// The subscription is taken before this returns, so no event written
    /// afterwards is missed.
    pub fn spawn(self) -> JoinHandle<()> {
        let mut events = self.storage.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        self.handle_event(&event);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Missed {} storage events; resyncing session", skipped);
                        self.resync();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
