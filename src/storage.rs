use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::SessionResult;

/// Keys of the browser-scoped entries used as local evidence.
pub mod keys {
    pub const WAS_LOGGED_IN: &str = "wasLoggedIn";
    pub const SESSION_ID: &str = "sessionId";
    pub const REDIRECT_AFTER_LOGIN: &str = "redirectAfterLogin";
    pub const IS_REDIRECTING: &str = "isRedirecting";
    pub const LAST_LOGIN_TIME: &str = "lastLoginTime";
    pub const LAST_VERIFIED_TIME: &str = "lastVerifiedTime";
    pub const LAST_SYNC_TIME: &str = "lastLanguageSyncTime";
    pub const CURRENT_LANGUAGE: &str = "currentLanguage";
    pub const LOCALE_RELOAD_ATTEMPTS: &str = "localeReloadAttempts";
}

/// A change made to storage by someone other than the receiver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Best-effort key/value cache, optionally mirrored to a JSON file.
///
/// Local writes do not raise events, matching the browser rule that a tab
/// never sees its own `storage` events. Changes made elsewhere arrive
/// through [`LocalStorage::apply_external`] or [`LocalStorage::refresh`].
#[derive(Clone)]
pub struct LocalStorage {
    inner: Arc<Inner>,
}

struct Inner {
    entries: RwLock<BTreeMap<String, String>>,
    path: Option<PathBuf>,
    events: broadcast::Sender<StorageEvent>,
}

impl LocalStorage {
    pub fn in_memory() -> Self {
        Self::with_entries(BTreeMap::new(), None)
    }

    /// Open (or create) a file-backed store.
    pub fn open(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = read_entries(&path)?;
        Ok(Self::with_entries(entries, Some(path)))
    }

    fn with_entries(entries: BTreeMap<String, String>, path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(entries),
                path,
                events,
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.entries.read().get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.get(key).as_deref(), Some("true"))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.inner.entries.write().insert(key.to_string(), value.into());
        self.persist();
    }

    pub fn remove(&self, key: &str) {
        let removed = self.inner.entries.write().remove(key);
        if removed.is_some() {
            self.persist();
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.inner.events.subscribe()
    }

    /// Record a write made by another tab or process and notify listeners.
    pub fn apply_external(&self, key: &str, new_value: Option<String>) {
        let old_value = {
            let mut entries = self.inner.entries.write();
            match &new_value {
                Some(value) => entries.insert(key.to_string(), value.clone()),
                None => entries.remove(key),
            }
        };
        if old_value != new_value {
            self.persist();
            let _ = self.inner.events.send(StorageEvent {
                key: key.to_string(),
                old_value,
                new_value,
            });
        }
    }

    /// Re-read the backing file and emit events for keys changed on disk.
    pub fn refresh(&self) -> SessionResult<Vec<StorageEvent>> {
        let Some(path) = &self.inner.path else {
            return Ok(Vec::new());
        };
        let on_disk = read_entries(path)?;

        let changes: Vec<StorageEvent> = {
            let mut entries = self.inner.entries.write();
            let mut changes = Vec::new();
            for key in entries.keys().chain(on_disk.keys()).cloned().collect::<std::collections::BTreeSet<_>>() {
                let old_value = entries.get(&key).cloned();
                let new_value = on_disk.get(&key).cloned();
                if old_value != new_value {
                    changes.push(StorageEvent { key, old_value, new_value });
                }
            }
            *entries = on_disk;
            changes
        };

        for change in &changes {
            let _ = self.inner.events.send(change.clone());
        }
        Ok(changes)
    }

    pub fn entries(&self) -> BTreeMap<String, String> {
        self.inner.entries.read().clone()
    }

    fn persist(&self) {
        let Some(path) = &self.inner.path else {
            return;
        };
        let snapshot = self.entries();
        let result = serde_json::to_string_pretty(&snapshot)
            .map_err(crate::error::SessionError::from)
            .and_then(|content| fs::write(path, content).map_err(Into::into));
        if let Err(e) = result {
            tracing::warn!("Failed to persist local storage to {}: {}", path.display(), e);
        }
    }
}

fn read_entries(path: &Path) -> SessionResult<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dashboard-storage-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn local_writes_are_silent() {
        let storage = LocalStorage::in_memory();
        let mut rx = storage.subscribe();
        storage.set(keys::WAS_LOGGED_IN, "true");
        assert!(storage.get_bool(keys::WAS_LOGGED_IN));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn external_writes_notify_listeners() {
        let storage = LocalStorage::in_memory();
        let mut rx = storage.subscribe();
        storage.apply_external("django_language", Some("ar".into()));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.key, "django_language");
        assert_eq!(event.new_value.as_deref(), Some("ar"));

        // Same value again is not a change
        storage.apply_external("django_language", Some("ar".into()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn file_store_round_trips_and_detects_outside_edits() {
        let path = temp_path("refresh");
        let _ = fs::remove_file(&path);

        let storage = LocalStorage::open(&path).unwrap();
        storage.set(keys::SESSION_ID, "abc");

        let reopened = LocalStorage::open(&path).unwrap();
        assert_eq!(reopened.get(keys::SESSION_ID).as_deref(), Some("abc"));

        // Another process edits the file
        let mut edited = reopened.entries();
        edited.insert(keys::CURRENT_LANGUAGE.to_string(), "ar".to_string());
        fs::write(&path, serde_json::to_string(&edited).unwrap()).unwrap();

        let changes = storage.refresh().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key, keys::CURRENT_LANGUAGE);
        assert_eq!(storage.get(keys::CURRENT_LANGUAGE).as_deref(), Some("ar"));

        let _ = fs::remove_file(&path);
    }
}
