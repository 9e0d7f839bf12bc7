use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::base::{notify, Storage, StorageError, StorageEvent, EVENT_CAPACITY};

struct Shared {
    path: PathBuf,
    // Serialises read-modify-write cycles between handles of this process.
    lock: Mutex<()>,
    events: broadcast::Sender<StorageEvent>,
}

/// Key/value storage kept in a JSON file.
///
/// Every write replaces the file atomically (temp file, then rename).
/// Change events reach the other handles opened from this one via `tab()`.
pub struct FileStorage {
    shared: Arc<Shared>,
    source: Uuid,
}

impl FileStorage {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let storage = Self {
            shared: Arc::new(Shared {
                path: path.to_path_buf(),
                lock: Mutex::new(()),
                events,
            }),
            source: Uuid::new_v4(),
        };
        // Surface a corrupt file at open time rather than on first read.
        storage.read_all()?;
        Ok(storage)
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn new_tab(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            source: Uuid::new_v4(),
        }
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match fs::read(&self.shared.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let tmp = self.shared.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.shared.path)?;
        debug!("Wrote {} session entries to {}", entries.len(), self.shared.path.display());
        Ok(())
    }

    fn update<F>(&self, key: &str, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> Option<String>,
    {
        let guard = match self.shared.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut entries = self.read_all()?;
        let old = change(&mut entries);
        let new = entries.get(key).cloned();
        if old != new {
            self.write_all(&entries)?;
        }
        drop(guard);
        notify(&self.shared.events, self.source, key, old, new);
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(key, |entries| {
            entries.insert(key.to_string(), value.to_string())
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(key, |entries| entries.remove(key))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let storage = FileStorage::open(&path).unwrap();
        storage.set("access_token", "abc").unwrap();
        storage.set("token_expires_at", "123").unwrap();
        storage.remove("token_expires_at").unwrap();
        drop(storage);

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get("access_token").unwrap().as_deref(), Some("abc"));
        assert_eq!(reopened.get("token_expires_at").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            FileStorage::open(&path),
            Err(StorageError::Corrupt(_))
        ));
    }

    #[test]
    fn test_tabs_see_each_others_events() {
        let dir = tempfile::tempdir().unwrap();
        let first = FileStorage::open(&dir.path().join("session.json")).unwrap();
        let second = first.new_tab();
        let mut events = second.subscribe();

        first.set("access_token", "abc").unwrap();
        let event = events.try_recv().expect("event should be queued");
        assert_eq!(event.source, first.source_id());
        assert_eq!(second.get("access_token").unwrap().as_deref(), Some("abc"));
    }
}
