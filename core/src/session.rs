//! Persisted session state.
//!
//! The client never reaches for ambient storage: it is handed an
//! `Arc<dyn SessionStore>`. Stores expose atomic per-key operations only;
//! there is no cross-key transaction, so `persist` and `clear` touch the
//! three keys one at a time.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::types::Session;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const USER_ID_KEY: &str = "userId";

/// String-keyed persistent storage, shaped like a browser's `localStorage`.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Write all three session fields.
pub fn persist(store: &dyn SessionStore, session: &Session) -> Result<(), StoreError> {
    store.set(ACCESS_TOKEN_KEY, &session.access_token)?;
    store.set(REFRESH_TOKEN_KEY, &session.refresh_token)?;
    store.set(USER_ID_KEY, &session.user_id.to_string())
}

/// Remove all three session fields. Every key is attempted even if an
/// earlier removal fails; the first error is returned.
pub fn clear(store: &dyn SessionStore) -> Result<(), StoreError> {
    let mut first_error = None;
    for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_ID_KEY] {
        if let Err(e) = store.remove(key) {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// The stored session, if all three fields are present and the user id
/// parses.
pub fn load(store: &dyn SessionStore) -> Result<Option<Session>, StoreError> {
    let access_token = store.get(ACCESS_TOKEN_KEY)?;
    let refresh_token = store.get(REFRESH_TOKEN_KEY)?;
    let user_id = store.get(USER_ID_KEY)?.and_then(|id| id.parse().ok());
    Ok(match (access_token, refresh_token, user_id) {
        (Some(access_token), Some(refresh_token), Some(user_id)) => Some(Session {
            access_token,
            refresh_token,
            user_id,
        }),
        _ => None,
    })
}

/// In-process store; lives as long as the value does.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

/// A JSON object on disk, rewritten on every mutation. A missing file reads
/// as empty.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the file through a sibling temp file and a rename, so readers
    /// see either the old map or the new one.
    fn write(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                parent
            }
            None => Path::new("."),
        };
        let raw = serde_json::to_string_pretty(entries)?;
        let mut staged = NamedTempFile::new_in(parent)?;
        staged.write_all(raw.as_bytes())?;
        staged.as_file().sync_all()?;
        staged.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.read()?;
        entries.insert(key.to_string(), value.to_string());
        self.write(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.read()?;
        if entries.remove(key).is_some() {
            self.write(&entries)?;
        }
        Ok(())
    }
}
