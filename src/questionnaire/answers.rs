//! Accumulated form answers
//!
//! Answers are keyed by question id and typed by value. They stay in this
//! form while the user fills in questions and are converted to a
//! [`ProfileUpdate`] only when handed to the save callback.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::catalog::{Question, OCCUPATION_FIELD};
use crate::error::{ClientError, Result};
use crate::profile::{OccupationDetails, Occupation, Profile, ProfileUpdate};
use crate::session::SessionId;

/// A single answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Text input or selected option label
    Text(String),
    /// Yes / no
    Flag(bool),
}

impl From<&str> for AnswerValue {
    fn from(s: &str) -> Self {
        AnswerValue::Text(s.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(s: String) -> Self {
        AnswerValue::Text(s)
    }
}

impl From<bool> for AnswerValue {
    fn from(b: bool) -> Self {
        AnswerValue::Flag(b)
    }
}

/// Answers collected so far, keyed by question id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answers {
    values: BTreeMap<String, AnswerValue>,
}

impl Answers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answer. An empty string means "unanswered" and clears it.
    pub fn set(&mut self, id: impl Into<String>, value: impl Into<AnswerValue>) {
        let id = id.into();
        match value.into() {
            AnswerValue::Text(text) if text.is_empty() => {
                self.values.remove(&id);
            }
            value => {
                self.values.insert(id, value);
            }
        }
    }

    pub fn clear(&mut self, id: &str) {
        self.values.remove(id);
    }

    pub fn get(&self, id: &str) -> Option<&AnswerValue> {
        self.values.get(id)
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        match self.values.get(id) {
            Some(AnswerValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn flag(&self, id: &str) -> Option<bool> {
        match self.values.get(id) {
            Some(AnswerValue::Flag(flag)) => Some(*flag),
            _ => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The occupation answer, if it names a known occupation
    pub fn occupation(&self) -> Option<Occupation> {
        self.text(OCCUPATION_FIELD).and_then(|o| o.parse().ok())
    }

    /// Ids of required questions in `questions` that have no answer yet
    pub fn missing<'q>(&self, questions: &'q [Question]) -> Vec<&'q str> {
        questions
            .iter()
            .filter(|q| q.required && !self.contains(q.id))
            .map(|q| q.id)
            .collect()
    }

    /// Working copy of a fetched profile
    pub fn from_profile(profile: &Profile) -> Self {
        let mut answers = Self::new();
        if let Some(ref state) = profile.state {
            answers.set("state", state.as_str());
        }
        if let Some(gender) = profile.gender {
            answers.set("gender", gender.as_str());
        }
        if let Some(category) = profile.social_category {
            answers.set("social_category", category.as_str());
        }
        if let Some(income) = profile.annual_income {
            answers.set("annual_income", income.as_str());
        }
        if let Some(flag) = profile.has_disability {
            answers.set("has_disability", flag);
        }
        answers.set(OCCUPATION_FIELD, profile.occupation().as_str());

        let mut put_text = |id: &str, value: &Option<String>| {
            if let Some(v) = value {
                answers.set(id, v.as_str());
            }
        };
        match &profile.details {
            OccupationDetails::Student { education_level, field_of_study, grades } => {
                put_text("education_level", education_level);
                put_text("field_of_study", field_of_study);
                put_text("grades", grades);
            }
            OccupationDetails::Farmer { land_size, crop_type, .. } => {
                put_text("land_size", land_size);
                put_text("crop_type", crop_type);
            }
            OccupationDetails::SelfEmployed { business_type, business_needs } => {
                put_text("business_type", business_type);
                put_text("business_needs", business_needs);
            }
            OccupationDetails::Unemployed { highest_education, .. } => {
                put_text("highest_education", highest_education);
            }
            OccupationDetails::SalariedEmployee {}
            | OccupationDetails::SeniorCitizen { .. }
            | OccupationDetails::Other {} => {}
        }

        let mut put_flag = |id: &str, value: Option<bool>| {
            if let Some(v) = value {
                answers.set(id, v);
            }
        };
        match &profile.details {
            OccupationDetails::Farmer { land_ownership, .. } => put_flag("land_ownership", *land_ownership),
            OccupationDetails::Unemployed { employment_seeking, .. } => {
                put_flag("employment_seeking", *employment_seeking)
            }
            OccupationDetails::SeniorCitizen { pension_status, health_needs } => {
                put_flag("pension_status", *pension_status);
                put_flag("health_needs", *health_needs);
            }
            _ => {}
        }

        answers
    }

    /// Convert to the typed write sent to the backend.
    ///
    /// Select answers must name a known option and yes/no answers must be
    /// flags; anything else is an [`ClientError::InvalidAnswer`]. Missing
    /// answers are simply omitted.
    pub fn to_update(&self, session_id: &SessionId) -> Result<ProfileUpdate> {
        let mut update = ProfileUpdate::new(session_id.clone());
        update.state = self.text_field("state")?;
        update.gender = self.choice("gender")?;
        update.social_category = self.choice("social_category")?;
        update.annual_income = self.choice("annual_income")?;
        update.has_disability = self.flag_field("has_disability")?;

        update.details = match self.choice::<Occupation>(OCCUPATION_FIELD)? {
            Some(occupation) => Some(self.details_for(occupation)?),
            None => None,
        };
        Ok(update)
    }

    fn details_for(&self, occupation: Occupation) -> Result<OccupationDetails> {
        Ok(match occupation {
            Occupation::Student => OccupationDetails::Student {
                education_level: self.text_field("education_level")?,
                field_of_study: self.text_field("field_of_study")?,
                grades: self.text_field("grades")?,
            },
            Occupation::Farmer => OccupationDetails::Farmer {
                land_ownership: self.flag_field("land_ownership")?,
                land_size: self.text_field("land_size")?,
                crop_type: self.text_field("crop_type")?,
            },
            Occupation::SelfEmployed => OccupationDetails::SelfEmployed {
                business_type: self.text_field("business_type")?,
                business_needs: self.text_field("business_needs")?,
            },
            Occupation::Unemployed => OccupationDetails::Unemployed {
                highest_education: self.text_field("highest_education")?,
                employment_seeking: self.flag_field("employment_seeking")?,
            },
            Occupation::SeniorCitizen => OccupationDetails::SeniorCitizen {
                pension_status: self.flag_field("pension_status")?,
                health_needs: self.flag_field("health_needs")?,
            },
            Occupation::SalariedEmployee => OccupationDetails::SalariedEmployee {},
            Occupation::Other => OccupationDetails::Other {},
        })
    }

    fn text_field(&self, id: &str) -> Result<Option<String>> {
        match self.values.get(id) {
            None => Ok(None),
            Some(AnswerValue::Text(text)) => Ok(Some(text.clone())),
            Some(AnswerValue::Flag(flag)) => Err(invalid(id, flag)),
        }
    }

    fn flag_field(&self, id: &str) -> Result<Option<bool>> {
        match self.values.get(id) {
            None => Ok(None),
            Some(AnswerValue::Flag(flag)) => Ok(Some(*flag)),
            Some(AnswerValue::Text(text)) => Err(invalid(id, text)),
        }
    }

    fn choice<T>(&self, id: &str) -> Result<Option<T>>
    where
        T: FromStr<Err = ClientError>,
    {
        self.text_field(id)?.map(|label| label.parse()).transpose()
    }
}

fn invalid(field: &str, value: impl ToString) -> ClientError {
    ClientError::InvalidAnswer {
        field: field.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Gender, IncomeBand, SocialCategory};
    use crate::questionnaire::catalog::PHASE_ONE;

    fn sid() -> SessionId {
        "ffeeddccbbaa99887766554433221100".parse().unwrap()
    }

    fn kerala_farmer() -> Answers {
        let mut answers = Answers::new();
        answers.set("state", "Kerala");
        answers.set("gender", "Female");
        answers.set("social_category", "OBC");
        answers.set("annual_income", "₹1-3 lakh");
        answers.set("has_disability", false);
        answers.set("occupation", "Farmer");
        answers
    }

    #[test]
    fn test_empty_text_clears_answer() {
        let mut answers = Answers::new();
        answers.set("gender", "Male");
        assert_eq!(answers.text("gender"), Some("Male"));

        answers.set("gender", "");
        assert!(!answers.contains("gender"));
    }

    #[test]
    fn test_boolean_tri_state() {
        let mut answers = Answers::new();
        assert_eq!(answers.flag("has_disability"), None);
        answers.set("has_disability", false);
        assert_eq!(answers.flag("has_disability"), Some(false));
        answers.set("has_disability", true);
        assert_eq!(answers.flag("has_disability"), Some(true));
    }

    #[test]
    fn test_missing_required() {
        let mut answers = kerala_farmer();
        assert!(answers.missing(&PHASE_ONE).is_empty());
        answers.clear("state");
        assert_eq!(answers.missing(&PHASE_ONE), vec!["state"]);
    }

    #[test]
    fn test_to_update_phase_one() {
        let update = kerala_farmer().to_update(&sid()).unwrap();
        assert_eq!(update.state.as_deref(), Some("Kerala"));
        assert_eq!(update.gender, Some(Gender::Female));
        assert_eq!(update.social_category, Some(SocialCategory::Obc));
        assert_eq!(update.annual_income, Some(IncomeBand::OneToThreeLakh));
        assert_eq!(update.has_disability, Some(false));
        assert_eq!(update.details, Some(OccupationDetails::empty(Occupation::Farmer)));
    }

    #[test]
    fn test_to_update_phase_two_fields() {
        let mut answers = kerala_farmer();
        answers.set("land_ownership", true);
        answers.set("land_size", "2 acres");
        answers.set("crop_type", "Paddy");

        let update = answers.to_update(&sid()).unwrap();
        assert_eq!(
            update.details,
            Some(OccupationDetails::Farmer {
                land_ownership: Some(true),
                land_size: Some("2 acres".into()),
                crop_type: Some("Paddy".into()),
            })
        );
    }

    #[test]
    fn test_to_update_rejects_bad_values() {
        let mut answers = kerala_farmer();
        answers.set("gender", "Unknown");
        assert!(matches!(
            answers.to_update(&sid()),
            Err(ClientError::InvalidAnswer { ref field, .. }) if field == "gender"
        ));

        let mut answers = kerala_farmer();
        answers.set("has_disability", "no");
        assert!(answers.to_update(&sid()).is_err());
    }

    #[test]
    fn test_without_occupation_has_no_details() {
        let mut answers = kerala_farmer();
        answers.clear("occupation");
        let update = answers.to_update(&sid()).unwrap();
        assert!(update.details.is_none());
        assert!(answers.occupation().is_none());
    }

    #[test]
    fn test_profile_working_copy_round_trip() {
        let mut answers = kerala_farmer();
        answers.set("land_ownership", false);
        answers.set("crop_type", "Rubber");
        let update = answers.to_update(&sid()).unwrap();
        let profile = Profile::from_update(&update, chrono::Utc::now()).unwrap();

        assert_eq!(Answers::from_profile(&profile), answers);
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let json = serde_json::to_value(kerala_farmer()).unwrap();
        assert_eq!(json["state"], "Kerala");
        assert_eq!(json["has_disability"], false);
    }
}
