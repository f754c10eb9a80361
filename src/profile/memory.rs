//! In-memory profile backend for tests and offline use.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::{Notify, RwLock};

use super::backend::ProfileBackend;
use super::types::{Profile, ProfileStatus, ProfileUpdate};
use crate::error::{ClientError, Result};
use crate::session::SessionId;

/// How injected save failures manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFailure {
    /// Backend answers `false`
    Reject,
    /// Request errors out
    Error,
}

/// Profile store held in memory.
///
/// Mirrors the server's semantics: the first save creates the record, later
/// saves only overwrite the fields they carry. Saves can be made to fail or
/// to hang until released, and every call is counted.
pub struct MemoryProfileBackend {
    profiles: RwLock<HashMap<SessionId, Profile>>,
    available: AtomicBool,
    save_failure: std::sync::Mutex<Option<SaveFailure>>,
    hold_saves: AtomicBool,
    release: Notify,
    save_calls: AtomicU32,
    fetch_calls: AtomicU32,
    delete_calls: AtomicU32,
    saved: std::sync::Mutex<Vec<ProfileUpdate>>,
}

impl MemoryProfileBackend {
    pub fn new() -> Self {
        Self {
            profiles: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            save_failure: std::sync::Mutex::new(None),
            hold_saves: AtomicBool::new(false),
            release: Notify::new(),
            save_calls: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
            delete_calls: AtomicU32::new(0),
            saved: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Seed a stored profile
    pub async fn with_profile(self, profile: Profile) -> Self {
        self.profiles
            .write()
            .await
            .insert(profile.session_id.clone(), profile);
        self
    }

    /// When false, every call fails with a transport-style error
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make subsequent saves fail (or succeed again with `None`)
    pub fn set_save_failure(&self, failure: Option<SaveFailure>) {
        *self.save_failure.lock().unwrap_or_else(|e| e.into_inner()) = failure;
    }

    /// Hold saves pending until [`release_saves`](Self::release_saves)
    pub fn hold_saves(&self) {
        self.hold_saves.store(true, Ordering::SeqCst);
    }

    pub fn release_saves(&self) {
        self.hold_saves.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    pub fn save_calls(&self) -> u32 {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> u32 {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Every update passed to `save`, in call order
    pub fn saved_updates(&self) -> Vec<ProfileUpdate> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub async fn stored(&self, session_id: &SessionId) -> Option<Profile> {
        self.profiles.read().await.get(session_id).cloned()
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::Server {
                status: 503,
                message: "memory backend unavailable".to_string(),
            })
        }
    }
}

impl Default for MemoryProfileBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileBackend for MemoryProfileBackend {
    async fn fetch(&self, session_id: &SessionId) -> Result<Option<Profile>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.stored(session_id).await)
    }

    async fn save(&self, update: &ProfileUpdate) -> Result<bool> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.saved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(update.clone());

        // Register interest before checking the flag so a release in between is not lost
        let released = self.release.notified();
        if self.hold_saves.load(Ordering::SeqCst) {
            released.await;
        }

        self.check_available()?;
        let failure = *self.save_failure.lock().unwrap_or_else(|e| e.into_inner());
        match failure {
            Some(SaveFailure::Reject) => return Ok(false),
            Some(SaveFailure::Error) => {
                return Err(ClientError::Server {
                    status: 500,
                    message: "Database connection error".to_string(),
                })
            }
            None => {}
        }

        let now = Utc::now();
        let mut profiles = self.profiles.write().await;
        match profiles.get_mut(&update.session_id) {
            Some(existing) => {
                existing.apply(update, now);
                Ok(true)
            }
            None => match Profile::from_update(update, now) {
                Some(profile) => {
                    profiles.insert(update.session_id.clone(), profile);
                    Ok(true)
                }
                // Typed records need an occupation to exist
                None => Ok(false),
            },
        }
    }

    async fn delete(&self, session_id: &SessionId) -> Result<bool> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        Ok(self.profiles.write().await.remove(session_id).is_some())
    }

    async fn exists(&self, session_id: &SessionId) -> Result<ProfileStatus> {
        self.check_available()?;
        let exists = self.profiles.read().await.contains_key(session_id);
        Ok(ProfileStatus {
            exists,
            is_complete: exists,
        })
    }
}
