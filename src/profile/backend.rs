//! Profile backend traits

use async_trait::async_trait;

use super::types::{Profile, ProfileStatus, ProfileUpdate};
use crate::error::Result;
use crate::session::SessionId;

/// Remote profile store, addressed by session identifier.
///
/// `Ok(false)` / `Ok(None)` mean the backend answered and declined;
/// `Err` means the request could not complete. Callers in this crate treat
/// both the same way.
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    /// Fetch the profile, `None` when the backend reports it absent
    async fn fetch(&self, session_id: &SessionId) -> Result<Option<Profile>>;

    /// Create or update; true when durably accepted
    async fn save(&self, update: &ProfileUpdate) -> Result<bool>;

    /// Delete; true when the backend acknowledged
    async fn delete(&self, session_id: &SessionId) -> Result<bool>;

    /// Existence and completeness flags
    async fn exists(&self, session_id: &SessionId) -> Result<ProfileStatus>;
}

/// Save callback injected into the questionnaire and the profile manager.
///
/// Resolves true only if the answers were durably accepted. An `Err` is
/// treated exactly like `Ok(false)`.
#[async_trait]
pub trait SaveProfile: Send + Sync {
    async fn save_profile(&self, update: &ProfileUpdate) -> Result<bool>;
}

#[async_trait]
impl<B> SaveProfile for B
where
    B: ProfileBackend + ?Sized,
{
    async fn save_profile(&self, update: &ProfileUpdate) -> Result<bool> {
        self.save(update).await
    }
}
