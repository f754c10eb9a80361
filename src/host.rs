//! Hosting page
//!
//! Owns the session identity and the backend, decides which view a session
//! starts in, and builds the components for it.

use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::manager::ProfileManager;
use crate::profile::{ProfileBackend, ProfileStatus};
use crate::questionnaire::Questionnaire;
use crate::report::{Failure, FailureReporter, Operation, TracingReporter};
use crate::session::{Identity, SessionId};

/// Which component the host presents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Questionnaire,
    Profile,
}

/// Result of booting the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boot {
    pub session_id: SessionId,
    pub view: View,
    pub status: ProfileStatus,
}

pub struct Host<B: ProfileBackend + 'static> {
    identity: Arc<Identity>,
    backend: Arc<B>,
    reporter: Arc<dyn FailureReporter>,
}

impl<B: ProfileBackend + 'static> Host<B> {
    pub fn new(identity: Arc<Identity>, backend: Arc<B>) -> Self {
        Self {
            identity,
            backend,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Load (or mint) the session id and pick the starting view.
    ///
    /// A failed existence check counts as "no profile".
    pub async fn boot(&self) -> Result<Boot> {
        let session_id = self.identity.initialize().await?;

        let status = match self.backend.exists(&session_id).await {
            Ok(status) => status,
            Err(e) => {
                self.reporter
                    .report(Failure::error(Operation::CheckExists, &session_id, &e));
                ProfileStatus::default()
            }
        };

        let view = if status.exists {
            View::Profile
        } else {
            View::Questionnaire
        };
        info!(session_id = %session_id, view = ?view, complete = status.is_complete, "Host booted");

        Ok(Boot {
            session_id,
            view,
            status,
        })
    }

    /// Full reload, e.g. after a profile deletion cleared the identity
    pub async fn reload(&self) -> Result<Boot> {
        info!("Reloading host");
        self.boot().await
    }

    pub fn questionnaire<F>(&self, session_id: SessionId, on_complete: F) -> Questionnaire
    where
        F: FnOnce() + Send + 'static,
    {
        Questionnaire::new(session_id, self.backend.clone(), on_complete)
            .with_reporter(self.reporter.clone())
    }

    pub fn profile_manager(&self, session_id: SessionId) -> ProfileManager {
        ProfileManager::new(session_id, self.backend.clone(), self.identity.clone())
            .with_reporter(self.reporter.clone())
    }
}
