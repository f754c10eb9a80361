//! Profile store client
//!
//! Mirrors the remote profile and switches between a read-only view of the
//! last fetched record and an editable working copy of it.

use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::lifetime::Lifetime;
use crate::profile::{Profile, ProfileBackend, SaveProfile};
use crate::questionnaire::answers::{AnswerValue, Answers};
use crate::questionnaire::catalog::{self, Question, PHASE_ONE};
use crate::report::{Failure, FailureReporter, Operation, TracingReporter};
use crate::session::{Identity, SessionId};

pub const DELETE_PROMPT: &str =
    "Are you sure you want to delete your profile? This cannot be undone.";

/// Blocking yes/no confirmation for destructive actions
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Confirms everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Accepted; the record was re-fetched and edit mode left
    Saved,
    /// Rejected or failed; still editing with edits intact
    Retained,
    Busy,
    NotEditing,
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Deleted and the local identity cleared; the host must reload
    Deleted,
    Cancelled,
    Retained,
    Discarded,
}

struct State {
    profile: Option<Profile>,
    /// Fetch pending (true until the first fetch settles)
    loading: bool,
    /// Save pending; only `save` sets or clears it
    saving: bool,
    editing: bool,
    draft: Answers,
}

pub struct ProfileManager {
    session_id: SessionId,
    backend: Arc<dyn ProfileBackend>,
    saver: Arc<dyn SaveProfile>,
    identity: Arc<Identity>,
    reporter: Arc<dyn FailureReporter>,
    lifetime: Lifetime,
    state: Mutex<State>,
}

impl ProfileManager {
    /// Manager whose updates go through `backend.save`
    pub fn new<B>(session_id: SessionId, backend: Arc<B>, identity: Arc<Identity>) -> Self
    where
        B: ProfileBackend + 'static,
    {
        Self {
            session_id,
            saver: backend.clone(),
            backend,
            identity,
            reporter: Arc::new(TracingReporter),
            lifetime: Lifetime::new(),
            state: Mutex::new(State {
                profile: None,
                loading: true,
                saving: false,
                editing: false,
                draft: Answers::new(),
            }),
        }
    }

    /// Replace the update function
    pub fn with_saver(mut self, saver: Arc<dyn SaveProfile>) -> Self {
        self.saver = saver;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Last successfully fetched profile
    pub async fn profile(&self) -> Option<Profile> {
        self.state.lock().await.profile.clone()
    }

    pub async fn is_loading(&self) -> bool {
        let state = self.state.lock().await;
        state.loading || state.saving
    }

    pub async fn is_editing(&self) -> bool {
        self.state.lock().await.editing
    }

    /// The working copy
    pub async fn draft(&self) -> Answers {
        self.state.lock().await.draft.clone()
    }

    /// Initial load
    pub async fn mount(&self) -> bool {
        self.fetch_profile().await
    }

    /// Fetch the canonical record. On failure the previous record stays.
    pub async fn fetch_profile(&self) -> bool {
        let fetched = self.refresh().await;
        self.state.lock().await.loading = false;
        fetched
    }

    async fn refresh(&self) -> bool {
        let result = match self.lifetime.run(self.backend.fetch(&self.session_id)).await {
            Some(result) => result,
            None => return false,
        };

        match result {
            Ok(Some(profile)) => {
                debug!(session_id = %self.session_id, occupation = %profile.occupation(), "Fetched profile");
                let mut state = self.state.lock().await;
                state.draft = Answers::from_profile(&profile);
                state.profile = Some(profile);
                true
            }
            Ok(None) => {
                self.reporter
                    .report(Failure::rejected(Operation::FetchProfile, &self.session_id));
                false
            }
            Err(e) => {
                self.reporter
                    .report(Failure::error(Operation::FetchProfile, &self.session_id, &e));
                false
            }
        }
    }

    /// Flip edit mode; either direction resets the working copy to the
    /// last fetched profile. Returns the new mode.
    pub async fn toggle_edit(&self) -> bool {
        let mut state = self.state.lock().await;
        state.editing = !state.editing;
        state.draft = state
            .profile
            .as_ref()
            .map(Answers::from_profile)
            .unwrap_or_default();
        state.editing
    }

    /// Merge a field into the working copy. Only while editing.
    pub async fn set_field(&self, id: &str, value: impl Into<AnswerValue>) -> bool {
        let mut state = self.state.lock().await;
        if !state.editing {
            return false;
        }
        state.draft.set(id, value);
        true
    }

    /// Fields the edit form offers for the working copy's occupation
    pub async fn editable_fields(&self) -> Vec<&'static Question> {
        let occupation = self.state.lock().await.draft.occupation();
        let mut fields: Vec<_> = PHASE_ONE.iter().collect();
        if let Some(specialized) = occupation.and_then(catalog::phase_two) {
            fields.extend(specialized.iter());
        }
        fields
    }

    /// Push the working copy through the update function
    pub async fn save(&self) -> SaveOutcome {
        if self.lifetime.is_ended() {
            return SaveOutcome::Discarded;
        }

        let draft = {
            let mut state = self.state.lock().await;
            if !state.editing {
                return SaveOutcome::NotEditing;
            }
            if state.saving {
                return SaveOutcome::Busy;
            }
            state.saving = true;
            state.draft.clone()
        };

        let accepted = match draft.to_update(&self.session_id) {
            Ok(update) => match self.lifetime.run(self.saver.save_profile(&update)).await {
                None => return SaveOutcome::Discarded,
                Some(Ok(true)) => true,
                Some(Ok(false)) => {
                    self.reporter
                        .report(Failure::rejected(Operation::SaveProfile, &self.session_id));
                    false
                }
                Some(Err(e)) => {
                    self.reporter
                        .report(Failure::error(Operation::SaveProfile, &self.session_id, &e));
                    false
                }
            },
            Err(e) => {
                self.reporter
                    .report(Failure::error(Operation::SaveProfile, &self.session_id, &e));
                false
            }
        };

        if !accepted {
            self.state.lock().await.saving = false;
            return SaveOutcome::Retained;
        }

        self.refresh().await;
        if self.lifetime.is_ended() {
            return SaveOutcome::Discarded;
        }

        let mut state = self.state.lock().await;
        state.loading = false;
        state.saving = false;
        state.editing = false;
        info!(session_id = %self.session_id, "Profile saved");
        SaveOutcome::Saved
    }

    /// Delete the remote profile and reset the local identity
    pub async fn delete_profile(&self, confirm: &dyn Confirm) -> DeleteOutcome {
        if self.lifetime.is_ended() {
            return DeleteOutcome::Discarded;
        }
        if !confirm.confirm(DELETE_PROMPT) {
            debug!(session_id = %self.session_id, "Profile deletion cancelled");
            return DeleteOutcome::Cancelled;
        }

        let deleted = match self.lifetime.run(self.backend.delete(&self.session_id)).await {
            None => return DeleteOutcome::Discarded,
            Some(Ok(true)) => true,
            Some(Ok(false)) => {
                self.reporter
                    .report(Failure::rejected(Operation::DeleteProfile, &self.session_id));
                false
            }
            Some(Err(e)) => {
                self.reporter
                    .report(Failure::error(Operation::DeleteProfile, &self.session_id, &e));
                false
            }
        };
        if !deleted {
            return DeleteOutcome::Retained;
        }

        if let Err(e) = self.identity.clear().await {
            self.reporter
                .report(Failure::error(Operation::ClearSession, &self.session_id, &e));
            return DeleteOutcome::Retained;
        }
        info!(session_id = %self.session_id, "Profile deleted");
        DeleteOutcome::Deleted
    }

    pub fn teardown(&self) {
        self.lifetime.end();
    }
}

/// Read-only rendering of a profile
pub struct ProfileView<'a>(pub &'a Profile);

impl ProfileView<'_> {
    /// Label/value rows in display order, unanswered fields shown as "-"
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let profile = self.0;
        let answers = Answers::from_profile(profile);
        let mut questions: Vec<&Question> = PHASE_ONE.iter().collect();
        if let Some(specialized) = catalog::phase_two(profile.occupation()) {
            questions.extend(specialized.iter());
        }

        questions
            .into_iter()
            .map(|q| {
                let value = match answers.get(q.id) {
                    Some(AnswerValue::Text(text)) => text.clone(),
                    Some(AnswerValue::Flag(true)) => "Yes".to_string(),
                    Some(AnswerValue::Flag(false)) => "No".to_string(),
                    None => "-".to_string(),
                };
                (q.prompt, value)
            })
            .collect()
    }
}

impl fmt::Display for ProfileView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session: {}", self.0.session_id)?;
        for (label, value) in self.rows() {
            writeln!(f, "{} {}", label, value)?;
        }
        if let Some(updated) = self.0.updated_at.or(self.0.created_at) {
            writeln!(f, "Last updated: {}", updated.format("%Y-%m-%d %H:%M UTC"))?;
        }
        Ok(())
    }
}
