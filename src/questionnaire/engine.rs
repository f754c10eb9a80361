//! Questionnaire state machine

use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::answers::{AnswerValue, Answers};
use super::catalog::{self, Question, OCCUPATION_FIELD, PHASE_ONE};
use crate::lifetime::Lifetime;
use crate::profile::SaveProfile;
use crate::report::{Failure, FailureReporter, Operation, TracingReporter};
use crate::session::SessionId;

/// Questionnaire phase. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    One,
    Two,
}

impl Phase {
    pub fn number(&self) -> u8 {
        match self {
            Phase::One => 1,
            Phase::Two => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase {}", self.number())
    }
}

/// What a call to [`Questionnaire::submit_phase`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Phase 1 saved and the occupation has follow-up questions
    EnteredPhaseTwo,
    /// Last applicable phase saved; the completion callback ran
    Completed,
    /// Save failed or was rejected; still on the same phase
    Retained,
    /// Another submission is in flight
    Busy,
    /// Nothing to submit: occupation unanswered, or already complete
    NotReady,
    /// Torn down before or during the save; nothing applied
    Discarded,
}

type CompletionCallback = Box<dyn FnOnce() + Send>;

struct State {
    phase: Phase,
    answers: Answers,
    loading: bool,
    on_complete: Option<CompletionCallback>,
}

/// Two-phase questionnaire
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use neethisaarathi::{MemoryProfileBackend, Questionnaire, SessionId, SubmitOutcome};
///
/// # async fn example() {
/// let backend = Arc::new(MemoryProfileBackend::new());
/// let form = Questionnaire::new(SessionId::generate(), backend, || println!("done"));
///
/// form.set_answer("state", "Kerala").await;
/// form.set_answer("occupation", "Unemployed").await;
///
/// assert_eq!(form.submit_phase().await, SubmitOutcome::Completed);
/// # }
/// ```
pub struct Questionnaire {
    session_id: SessionId,
    saver: Arc<dyn SaveProfile>,
    reporter: Arc<dyn FailureReporter>,
    lifetime: Lifetime,
    state: Mutex<State>,
}

impl Questionnaire {
    pub fn new<F>(session_id: SessionId, saver: Arc<dyn SaveProfile>, on_complete: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            session_id,
            saver,
            reporter: Arc::new(TracingReporter),
            lifetime: Lifetime::new(),
            state: Mutex::new(State {
                phase: Phase::One,
                answers: Answers::new(),
                loading: false,
                on_complete: Some(Box::new(on_complete)),
            }),
        }
    }

    /// Route absorbed failures somewhere other than the log
    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub async fn current_phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    pub async fn is_loading(&self) -> bool {
        self.state.lock().await.loading
    }

    /// True once the completion callback has run
    pub async fn is_complete(&self) -> bool {
        self.state.lock().await.on_complete.is_none()
    }

    /// Snapshot of everything answered so far
    pub async fn answers(&self) -> Answers {
        self.state.lock().await.answers.clone()
    }

    /// Questions to render for the current phase
    pub async fn questions(&self) -> &'static [Question] {
        let state = self.state.lock().await;
        match state.phase {
            Phase::One => &PHASE_ONE[..],
            Phase::Two => state
                .answers
                .occupation()
                .and_then(catalog::phase_two)
                .unwrap_or(&[]),
        }
    }

    /// Required questions of the current phase still unanswered.
    ///
    /// Advisory: submission does not depend on it beyond the occupation.
    pub async fn unanswered(&self) -> Vec<&'static str> {
        let questions = self.questions().await;
        self.state.lock().await.answers.missing(questions)
    }

    /// Record an answer for a question of the current phase.
    ///
    /// Returns false, leaving answers untouched, for ids outside the current
    /// phase; earlier phases cannot be revisited.
    pub async fn set_answer(&self, id: &str, value: impl Into<AnswerValue>) -> bool {
        let value = value.into();
        let mut state = self.state.lock().await;
        let allowed = match state.phase {
            Phase::One => &PHASE_ONE[..],
            Phase::Two => state
                .answers
                .occupation()
                .and_then(catalog::phase_two)
                .unwrap_or(&[]),
        };
        if !allowed.iter().any(|q| q.id == id) {
            debug!(question = id, phase = %state.phase, "Ignoring answer outside current phase");
            return false;
        }
        state.answers.set(id, value);
        true
    }

    /// Whether the submit control should be enabled
    pub async fn can_submit(&self) -> bool {
        let state = self.state.lock().await;
        Self::ready(&state) && !state.loading && !self.lifetime.is_ended()
    }

    fn ready(state: &State) -> bool {
        let has_occupation = state.answers.text(OCCUPATION_FIELD).is_some();
        state.on_complete.is_some() && (state.phase != Phase::One || has_occupation)
    }

    /// Save the accumulated answers and advance.
    ///
    /// Failures of any kind leave the phase unchanged and are reported, not
    /// returned.
    pub async fn submit_phase(&self) -> SubmitOutcome {
        if self.lifetime.is_ended() {
            return SubmitOutcome::Discarded;
        }

        let (phase, answers) = {
            let mut state = self.state.lock().await;
            if state.loading {
                return SubmitOutcome::Busy;
            }
            if !Self::ready(&state) {
                return SubmitOutcome::NotReady;
            }
            state.loading = true;
            (state.phase, state.answers.clone())
        };
        let operation = Operation::SubmitPhase(phase.number());

        let saved = match answers.to_update(&self.session_id) {
            Ok(update) => match self.lifetime.run(self.saver.save_profile(&update)).await {
                None => {
                    debug!(session_id = %self.session_id, %phase, "Discarding save result after teardown");
                    return SubmitOutcome::Discarded;
                }
                Some(Ok(true)) => true,
                Some(Ok(false)) => {
                    self.reporter.report(Failure::rejected(operation, &self.session_id));
                    false
                }
                Some(Err(e)) => {
                    self.reporter.report(Failure::error(operation, &self.session_id, &e));
                    false
                }
            },
            Err(e) => {
                self.reporter.report(Failure::error(operation, &self.session_id, &e));
                false
            }
        };

        let mut state = self.state.lock().await;
        state.loading = false;
        if !saved {
            return SubmitOutcome::Retained;
        }

        let follow_up = answers.occupation().and_then(catalog::phase_two);
        if phase == Phase::One && follow_up.is_some() {
            state.phase = Phase::Two;
            info!(session_id = %self.session_id, occupation = ?answers.occupation(), "Entering phase 2");
            return SubmitOutcome::EnteredPhaseTwo;
        }

        let on_complete = state.on_complete.take();
        drop(state);
        info!(session_id = %self.session_id, %phase, "Questionnaire complete");
        if let Some(callback) = on_complete {
            callback();
        }
        SubmitOutcome::Completed
    }

    /// Tear the component down; pending saves are discarded
    pub fn teardown(&self) {
        self.lifetime.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientError, Result};
    use crate::profile::{MemoryProfileBackend, ProfileUpdate, SaveFailure};
    use crate::report::CollectingReporter;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> (Arc<AtomicU32>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let hook = count.clone();
        (count, move || {
            hook.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn fill_phase_one(form: &Questionnaire, occupation: &str) {
        assert!(form.set_answer("state", "Kerala").await);
        assert!(form.set_answer("gender", "Female").await);
        assert!(form.set_answer("social_category", "OBC").await);
        assert!(form.set_answer("annual_income", "₹1-3 lakh").await);
        assert!(form.set_answer("has_disability", false).await);
        assert!(form.set_answer("occupation", occupation).await);
    }

    #[tokio::test]
    async fn test_student_enters_phase_two() {
        let backend = Arc::new(MemoryProfileBackend::new());
        let (completed, on_complete) = counter();
        let form = Questionnaire::new(SessionId::generate(), backend.clone(), on_complete);

        fill_phase_one(&form, "Student").await;
        assert_eq!(form.submit_phase().await, SubmitOutcome::EnteredPhaseTwo);

        assert_eq!(form.current_phase().await, Phase::Two);
        assert_eq!(completed.load(Ordering::SeqCst), 0);
        let ids: Vec<_> = form.questions().await.iter().map(|q| q.id).collect();
        assert_eq!(ids, ["education_level", "field_of_study", "grades"]);
    }

    #[tokio::test]
    async fn test_unemployed_completes_after_phase_one() {
        let backend = Arc::new(MemoryProfileBackend::new());
        let (completed, on_complete) = counter();
        let form = Questionnaire::new(SessionId::generate(), backend, on_complete);

        fill_phase_one(&form, "Unemployed").await;
        assert_eq!(form.submit_phase().await, SubmitOutcome::Completed);

        assert_eq!(form.current_phase().await, Phase::One);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert!(form.is_complete().await);
        assert_eq!(form.submit_phase().await, SubmitOutcome::NotReady);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_save_retains_phase() {
        let backend = Arc::new(MemoryProfileBackend::new());
        backend.set_save_failure(Some(SaveFailure::Reject));
        let reporter = Arc::new(CollectingReporter::new());
        let (completed, on_complete) = counter();
        let form = Questionnaire::new(SessionId::generate(), backend.clone(), on_complete)
            .with_reporter(reporter.clone());

        fill_phase_one(&form, "Student").await;
        assert_eq!(form.submit_phase().await, SubmitOutcome::Retained);

        assert_eq!(form.current_phase().await, Phase::One);
        assert!(!form.is_loading().await);
        assert_eq!(completed.load(Ordering::SeqCst), 0);
        assert_eq!(reporter.len(), 1);

        // retry succeeds once the backend accepts
        backend.set_save_failure(None);
        assert_eq!(form.submit_phase().await, SubmitOutcome::EnteredPhaseTwo);
    }

    struct FailingSaver;

    #[async_trait]
    impl SaveProfile for FailingSaver {
        async fn save_profile(&self, _update: &ProfileUpdate) -> Result<bool> {
            Err(ClientError::InvalidResponse("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn test_erroring_save_is_absorbed() {
        let reporter = Arc::new(CollectingReporter::new());
        let (completed, on_complete) = counter();
        let form = Questionnaire::new(SessionId::generate(), Arc::new(FailingSaver), on_complete)
            .with_reporter(reporter.clone());

        fill_phase_one(&form, "Farmer").await;
        assert_eq!(form.submit_phase().await, SubmitOutcome::Retained);
        assert_eq!(form.current_phase().await, Phase::One);
        assert_eq!(completed.load(Ordering::SeqCst), 0);
        assert_eq!(reporter.failures()[0].operation, Operation::SubmitPhase(1));
    }

    #[tokio::test]
    async fn test_submit_requires_occupation() {
        let backend = Arc::new(MemoryProfileBackend::new());
        let form = Questionnaire::new(SessionId::generate(), backend.clone(), || {});

        form.set_answer("state", "Goa").await;
        assert!(!form.can_submit().await);
        assert_eq!(form.submit_phase().await, SubmitOutcome::NotReady);
        assert_eq!(backend.save_calls(), 0);

        form.set_answer("occupation", "Other").await;
        assert!(form.can_submit().await);
    }

    #[tokio::test]
    async fn test_unanswered_required_questions() {
        let backend = Arc::new(MemoryProfileBackend::new());
        let form = Questionnaire::new(SessionId::generate(), backend, || {});

        assert_eq!(form.unanswered().await.len(), PHASE_ONE.len());
        form.set_answer("state", "Goa").await;
        form.set_answer("has_disability", false).await;
        assert_eq!(
            form.unanswered().await,
            ["gender", "social_category", "annual_income", "occupation"]
        );

        form.set_answer("occupation", "Student").await;
        form.submit_phase().await;
        assert_eq!(
            form.unanswered().await,
            ["education_level", "field_of_study", "grades"]
        );
    }

    #[tokio::test]
    async fn test_kerala_farmer_gets_farming_questions() {
        let backend = Arc::new(MemoryProfileBackend::new());
        let (completed, on_complete) = counter();
        let form = Questionnaire::new(SessionId::generate(), backend.clone(), on_complete);

        fill_phase_one(&form, "Farmer").await;
        assert_eq!(form.submit_phase().await, SubmitOutcome::EnteredPhaseTwo);

        assert_eq!(form.current_phase().await, Phase::Two);
        let ids: Vec<_> = form.questions().await.iter().map(|q| q.id).collect();
        assert_eq!(ids, ["land_ownership", "land_size", "crop_type"]);
        assert_eq!(completed.load(Ordering::SeqCst), 0);
        assert_eq!(backend.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_senior_citizen_completes_without_phase_two() {
        let backend = Arc::new(MemoryProfileBackend::new());
        let (completed, on_complete) = counter();
        let form = Questionnaire::new(SessionId::generate(), backend.clone(), on_complete);

        fill_phase_one(&form, "Senior Citizen").await;
        assert_eq!(form.submit_phase().await, SubmitOutcome::Completed);

        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(form.current_phase().await, Phase::One);
        let ids: Vec<_> = form.questions().await.iter().map(|q| q.id).collect();
        assert_eq!(ids, PHASE_ONE.iter().map(|q| q.id).collect::<Vec<_>>());
        assert_eq!(backend.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_answers_accumulate_across_phases() {
        let backend = Arc::new(MemoryProfileBackend::new());
        let (completed, on_complete) = counter();
        let form = Questionnaire::new(SessionId::generate(), backend.clone(), on_complete);

        fill_phase_one(&form, "Student").await;
        form.submit_phase().await;

        assert!(form.set_answer("education_level", "Undergraduate").await);
        assert!(form.set_answer("field_of_study", "Law").await);
        assert!(form.set_answer("grades", "8.1 CGPA").await);
        assert_eq!(form.submit_phase().await, SubmitOutcome::Completed);
        assert_eq!(completed.load(Ordering::SeqCst), 1);

        let saved = backend.saved_updates();
        assert_eq!(saved.len(), 2);
        let last = &saved[1];
        assert_eq!(last.state.as_deref(), Some("Kerala"));
        assert_eq!(last.has_disability, Some(false));
        assert_eq!(
            last.details,
            Some(crate::profile::OccupationDetails::Student {
                education_level: Some("Undergraduate".into()),
                field_of_study: Some("Law".into()),
                grades: Some("8.1 CGPA".into()),
            })
        );

        let answers = form.answers().await;
        for id in ["state", "gender", "social_category", "annual_income", "has_disability", "occupation", "education_level", "field_of_study", "grades"] {
            assert!(answers.contains(id), "missing {}", id);
        }
    }

    #[tokio::test]
    async fn test_phase_one_is_closed_in_phase_two() {
        let backend = Arc::new(MemoryProfileBackend::new());
        let form = Questionnaire::new(SessionId::generate(), backend, || {});

        fill_phase_one(&form, "Farmer").await;
        form.submit_phase().await;

        assert!(!form.set_answer("occupation", "Student").await);
        assert!(!form.set_answer("education_level", "Postgraduate").await);
        assert_eq!(form.answers().await.text("occupation"), Some("Farmer"));
        assert!(form.set_answer("land_ownership", true).await);
    }

    #[tokio::test]
    async fn test_double_submit_is_busy() {
        let backend = Arc::new(MemoryProfileBackend::new());
        backend.hold_saves();
        let form = Arc::new(Questionnaire::new(SessionId::generate(), backend.clone(), || {}));
        fill_phase_one(&form, "Farmer").await;

        let first = {
            let form = form.clone();
            tokio::spawn(async move { form.submit_phase().await })
        };
        while !form.is_loading().await {
            tokio::task::yield_now().await;
        }

        assert!(!form.can_submit().await);
        assert_eq!(form.submit_phase().await, SubmitOutcome::Busy);

        backend.release_saves();
        assert_eq!(first.await.unwrap(), SubmitOutcome::EnteredPhaseTwo);
        assert_eq!(backend.save_calls(), 1);
    }

    #[tokio::test]
    async fn test_teardown_discards_inflight_save() {
        let backend = Arc::new(MemoryProfileBackend::new());
        backend.hold_saves();
        let (completed, on_complete) = counter();
        let form = Arc::new(Questionnaire::new(SessionId::generate(), backend.clone(), on_complete));
        fill_phase_one(&form, "Senior Citizen").await;

        let pending = {
            let form = form.clone();
            tokio::spawn(async move { form.submit_phase().await })
        };
        while !form.is_loading().await {
            tokio::task::yield_now().await;
        }

        form.teardown();
        assert_eq!(pending.await.unwrap(), SubmitOutcome::Discarded);
        assert_eq!(completed.load(Ordering::SeqCst), 0);
        assert_eq!(form.submit_phase().await, SubmitOutcome::Discarded);
        backend.release_saves();
    }
}
