//! Two-phase profile questionnaire
//!
//! Phase 1 asks everyone the same questions. Phase 2 exists only for
//! occupations with a follow-up set in the catalog. Answers accumulate
//! across phases and are saved through an injected callback after each
//! phase.

pub mod answers;
pub mod catalog;
mod engine;

pub use answers::{AnswerValue, Answers};
pub use catalog::{Question, QuestionKind, PHASE_ONE, PHASE_TWO};
pub use engine::{Phase, Questionnaire, SubmitOutcome};
