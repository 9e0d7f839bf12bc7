use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use uuid::Uuid;

use super::base::{notify, Storage, StorageError, StorageEvent, EVENT_CAPACITY};

struct Shared {
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

/// In-process storage. Handles created with `tab()` or `new_tab()` share
/// entries and events, each with its own source id.
pub struct MemoryStorage {
    shared: Arc<Shared>,
    source: Uuid,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                events,
            }),
            source: Uuid::new_v4(),
        }
    }

    /// A new handle over the same entries with its own source id.
    pub fn new_tab(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            source: Uuid::new_v4(),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        match self.shared.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let old = self.entries().insert(key.to_string(), value.to_string());
        notify(
            &self.shared.events,
            self.source,
            key,
            old,
            Some(value.to_string()),
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let old = self.entries().remove(key);
        notify(&self.shared.events, self.source, key, old, None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.shared.events.subscribe()
    }

    fn source_id(&self) -> Uuid {
        self.source
    }

    fn tab(&self) -> Arc<dyn Storage> {
        Arc::new(self.new_tab())
    }
}
