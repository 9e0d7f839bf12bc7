use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use super::base::{Storage, StorageError, StorageEvent};

/// Storage used when persistence is disabled: nothing is kept, nothing is
/// ever announced, and the session lives only in memory.
pub struct NoStorage {
    events: broadcast::Sender<StorageEvent>,
    source: Uuid,
}

impl NoStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1);
        NoStorage {
            events,
            source: Uuid::new_v4(),
        }
    }
}

impl Default for NoStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for NoStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    fn source_id(&self) -> Uuid {
        self.source
    }

    fn tab(&self) -> Arc<dyn Storage> {
        Arc::new(NoStorage::new())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes are accepted and forgotten.
    #[test]
    fn test_no_storage_forgets_writes() {
        let storage = NoStorage::new();
        storage.set("access_token", "abc").unwrap();
        assert_eq!(storage.get("access_token").unwrap(), None);
    }

    /// Nothing is announced to subscribers.
    #[test]
    fn test_no_storage_is_silent() {
        let storage = NoStorage::new();
        let mut events = storage.subscribe();
        storage.set("access_token", "abc").unwrap();
        storage.remove("access_token").unwrap();
        assert!(events.try_recv().is_err());
        assert!(!storage.is_enabled());
    }
}
