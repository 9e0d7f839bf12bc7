use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use super::{file_store::FileStorage, memory_store::MemoryStorage, no_store::NoStorage};
use crate::config::StorageConfig;

/// Capacity of the change-notification channel shared by all handles of one backing store.
pub(crate) const EVENT_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage contents are corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A change made through one storage handle, delivered to every subscriber.
///
/// `source` identifies the handle that made the change so a listener can
/// ignore its own writes, the way a browser only fires `storage` events in
/// other tabs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub source: Uuid,
}

/// Persisted string key/value storage with change notifications.
///
/// Operations are synchronous: the optimistic hydration step must finish
/// before anything else observes the session.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    /// Receive every change made to the backing store, including this handle's own.
    fn subscribe(&self) -> broadcast::Receiver<StorageEvent>;
    /// Identity of this handle, stamped on the events it causes.
    fn source_id(&self) -> Uuid;
    /// Another handle ("tab") over the same backing store.
    fn tab(&self) -> Arc<dyn Storage>;
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Creates a concrete storage implementation based on the StorageConfig.
pub fn create_storage(config: &StorageConfig) -> Result<Arc<dyn Storage>, StorageError> {
    match config {
        StorageConfig::Memory => {
            info!("Using in-memory session storage.");
            Ok(Arc::new(MemoryStorage::new()))
        }
        StorageConfig::File(file_config) => {
            info!("Using file session storage at {}", file_config.path.display());
            Ok(Arc::new(FileStorage::open(&file_config.path)?))
        }
        StorageConfig::Disabled => {
            info!("Session storage is disabled. Using NoStorage.");
            Ok(Arc::new(NoStorage::new()))
        }
    }
}

/// Send a change notification unless the value did not actually change.
pub(crate) fn notify(
    events: &broadcast::Sender<StorageEvent>,
    source: Uuid,
    key: &str,
    old_value: Option<String>,
    new_value: Option<String>,
) {
    if old_value == new_value {
        return;
    }
    // No subscribers is not an error.
    let _ = events.send(StorageEvent {
        key: key.to_string(),
        old_value,
        new_value,
        source,
    });
}
