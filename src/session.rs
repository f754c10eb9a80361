//! Session identity
//!
//! A session identifier is the only thing correlating this client with its
//! server-side profile. It is generated locally (16 random bytes, hex
//! encoded), persisted under a single well-known key, and cleared only when
//! the profile is deleted. Clearing it resets identity: the next
//! [`Identity::initialize`] mints a fresh value.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};

/// Well-known storage key holding the session identifier
pub const SESSION_KEY: &str = "neethisaarathi_session_id";

/// File name of the on-disk local storage
pub const STORAGE_FILE: &str = "local_storage.json";

const SESSION_BYTES: usize = 16;

/// Opaque 32-character lowercase hex session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random identifier
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let valid = s.len() == SESSION_BYTES * 2
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !valid {
            return Err(ClientError::Storage(format!("malformed session id: {:?}", s)));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for SessionId {
    type Error = ClientError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Persistent string key/value storage (the browser local storage analogue)
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Local storage backed by a JSON object on disk
pub struct FileSessionStore {
    path: PathBuf,
    // Serializes read-modify-write cycles from this process
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .map_err(|e| ClientError::Storage(format!("{}: {}", self.path.display(), e)))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// In-process local storage
#[derive(Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Process-wide session identity
///
/// Lifecycle: `initialize` once at startup (generate-if-absent), `current`
/// on every profile operation, `clear` only on explicit profile deletion.
pub struct Identity {
    store: Arc<dyn SessionStore>,
    current: RwLock<Option<SessionId>>,
}

impl Identity {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    /// Read the persisted identifier, generating and persisting one if absent
    pub async fn initialize(&self) -> Result<SessionId> {
        let mut current = self.current.write().await;

        let stored = match self.store.get(SESSION_KEY)? {
            Some(raw) => match raw.parse::<SessionId>() {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(error = %e, "Discarding unreadable session id");
                    None
                }
            },
            None => None,
        };

        let id = match stored {
            Some(id) => {
                debug!(session_id = %id, "Loaded session id");
                id
            }
            None => {
                let id = SessionId::generate();
                self.store.set(SESSION_KEY, id.as_str())?;
                info!(session_id = %id, "Generated new session id");
                id
            }
        };

        *current = Some(id.clone());
        Ok(id)
    }

    /// The identifier loaded by the last `initialize`, if any
    pub async fn current(&self) -> Option<SessionId> {
        self.current.read().await.clone()
    }

    /// Remove the persisted identifier; the next `initialize` mints a new one
    pub async fn clear(&self) -> Result<()> {
        let mut current = self.current.write().await;
        self.store.remove(SESSION_KEY)?;
        if let Some(old) = current.take() {
            info!(session_id = %old, "Cleared session id");
        }
        Ok(())
    }

    /// Whether the persistent key is present
    pub fn is_persisted(&self) -> Result<bool> {
        Ok(self.store.get(SESSION_KEY)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_shape() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        assert_ne!(id, SessionId::generate());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("abc".parse::<SessionId>().is_err());
        assert!("0123456789ABCDEF0123456789abcdef".parse::<SessionId>().is_err());
        assert!("0123456789abcdef0123456789abcdeg".parse::<SessionId>().is_err());
        assert!("0123456789abcdef0123456789abcdef".parse::<SessionId>().is_ok());
    }

    #[test]
    fn test_serde_validates() {
        let id: SessionId = serde_json::from_str("\"00112233445566778899aabbccddeeff\"").unwrap();
        assert_eq!(id.as_str(), "00112233445566778899aabbccddeeff");
        assert!(serde_json::from_str::<SessionId>("\"nope\"").is_err());
    }

    #[tokio::test]
    async fn test_initialize_is_stable() {
        let identity = Identity::new(Arc::new(MemorySessionStore::new()));
        assert!(identity.current().await.is_none());

        let first = identity.initialize().await.unwrap();
        let second = identity.initialize().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(identity.current().await, Some(first));
    }

    #[tokio::test]
    async fn test_clear_resets_identity() {
        let store = Arc::new(MemorySessionStore::new());
        let identity = Identity::new(store.clone());

        let first = identity.initialize().await.unwrap();
        identity.clear().await.unwrap();

        assert!(store.get(SESSION_KEY).unwrap().is_none());
        assert!(identity.current().await.is_none());

        let second = identity.initialize().await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_malformed_stored_value_is_replaced() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(SESSION_KEY, "not-a-session").unwrap();

        let identity = Identity::new(store.clone());
        let id = identity.initialize().await.unwrap();

        assert_eq!(store.get(SESSION_KEY).unwrap().as_deref(), Some(id.as_str()));
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(STORAGE_FILE);
        let store = FileSessionStore::new(&path);

        assert!(store.get(SESSION_KEY).unwrap().is_none());
        store.set(SESSION_KEY, "value").unwrap();
        store.set("other", "kept").unwrap();

        let reopened = FileSessionStore::new(&path);
        assert_eq!(reopened.get(SESSION_KEY).unwrap().as_deref(), Some("value"));

        reopened.remove(SESSION_KEY).unwrap();
        assert!(store.get(SESSION_KEY).unwrap().is_none());
        assert_eq!(store.get("other").unwrap().as_deref(), Some("kept"));
    }
}
