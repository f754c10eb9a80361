//! Question catalog
//!
//! Phase 1 is a fixed list asked of everyone. Phase 2 is looked up by the
//! Phase-1 occupation answer in [`PHASE_TWO`]; an occupation without an
//! entry has no second phase. Giving an occupation a follow-up phase is a
//! matter of adding a row to that table.

use serde::Serialize;

use crate::profile::{Gender, IncomeBand, Occupation, SocialCategory};

/// How a question is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "options", rename_all = "lowercase")]
pub enum QuestionKind {
    /// Free string
    Text,
    /// One of a fixed list of labels
    Select(&'static [&'static str]),
    /// Yes / no, unanswered until chosen
    Boolean,
}

/// A single form question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Question {
    /// Key into the accumulated answers; matches the profile field name
    pub id: &'static str,
    pub prompt: &'static str,
    pub kind: QuestionKind,
    /// Advisory only, the backend decides completeness
    pub required: bool,
}

impl Question {
    const fn new(id: &'static str, prompt: &'static str, kind: QuestionKind) -> Self {
        Self {
            id,
            prompt,
            kind,
            required: true,
        }
    }

    /// Options offered by a select question, empty otherwise
    pub fn options(&self) -> &'static [&'static str] {
        match self.kind {
            QuestionKind::Select(options) => options,
            _ => &[],
        }
    }
}

pub const OCCUPATION_FIELD: &str = "occupation";

/// Questions asked of every user
pub static PHASE_ONE: [Question; 6] = [
    Question::new("state", "What is your State of Domicile?", QuestionKind::Text),
    Question::new("gender", "What is your Gender?", QuestionKind::Select(Gender::LABELS)),
    Question::new(
        "social_category",
        "What is your Social Category?",
        QuestionKind::Select(SocialCategory::LABELS),
    ),
    Question::new(
        "annual_income",
        "What is your approximate Annual Family Income?",
        QuestionKind::Select(IncomeBand::LABELS),
    ),
    Question::new("has_disability", "Do you have any disabilities?", QuestionKind::Boolean),
    Question::new(
        OCCUPATION_FIELD,
        "What is your primary occupation or status?",
        QuestionKind::Select(Occupation::LABELS),
    ),
];

const EDUCATION_LEVELS: &[&str] = &["Below Class 10", "Class 10-12", "Undergraduate", "Postgraduate"];

const STUDENT: &[Question] = &[
    Question::new(
        "education_level",
        "What is your current level of education?",
        QuestionKind::Select(EDUCATION_LEVELS),
    ),
    Question::new("field_of_study", "What is your field of study?", QuestionKind::Text),
    Question::new(
        "grades",
        "What was your percentage/CGPA in your last major exam?",
        QuestionKind::Text,
    ),
];

const FARMER: &[Question] = &[
    Question::new("land_ownership", "Do you own the land you cultivate?", QuestionKind::Boolean),
    Question::new("land_size", "What is the size of your land holding?", QuestionKind::Text),
    Question::new("crop_type", "What type of crops or farming do you practice?", QuestionKind::Text),
];

const SELF_EMPLOYED: &[Question] = &[
    Question::new("business_type", "What kind of business or craft do you run?", QuestionKind::Text),
    Question::new(
        "business_needs",
        "What support does your business need most (credit, licences, markets)?",
        QuestionKind::Text,
    ),
];

/// Occupation-specific follow-up questions
pub static PHASE_TWO: &[(Occupation, &[Question])] = &[
    (Occupation::Student, STUDENT),
    (Occupation::Farmer, FARMER),
    (Occupation::SelfEmployed, SELF_EMPLOYED),
];

/// Phase-2 questions for `occupation`, if it has a second phase
pub fn phase_two(occupation: Occupation) -> Option<&'static [Question]> {
    PHASE_TWO
        .iter()
        .find(|(o, _)| *o == occupation)
        .map(|(_, questions)| *questions)
}

/// Look a question up by id across both phases
pub fn find(id: &str) -> Option<&'static Question> {
    PHASE_ONE
        .iter()
        .chain(PHASE_TWO.iter().flat_map(|(_, questions)| questions.iter()))
        .find(|q| q.id == id)
}
