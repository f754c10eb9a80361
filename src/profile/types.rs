//! Profile record types
//!
//! The server stores a flat record. Here the occupation-specific columns are
//! folded into [`OccupationDetails`], a union tagged by the `occupation`
//! field itself, so a Student profile cannot carry farming fields.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ClientError;
use crate::session::SessionId;

/// Closed set of option labels that round-trip through the wire as strings
macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $( $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            /// Every value, in display order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Display labels, in display order
            pub const LABELS: &'static [&'static str] = &[$($label),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ClientError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(ClientError::InvalidAnswer {
                        field: $field.to_string(),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

labeled_enum! {
    Gender, "gender" {
        Male => "Male",
        Female => "Female",
        Transgender => "Transgender",
        Other => "Other",
    }
}

labeled_enum! {
    SocialCategory, "social_category" {
        General => "General",
        Obc => "OBC",
        Sc => "SC",
        St => "ST",
        Other => "Other",
    }
}

labeled_enum! {
    /// Annual family income in lakh-rupee bands
    IncomeBand, "annual_income" {
        BelowOneLakh => "Less than ₹1 lakh",
        OneToThreeLakh => "₹1-3 lakh",
        ThreeToEightLakh => "₹3-8 lakh",
        AboveEightLakh => "Above ₹8 lakh",
    }
}

labeled_enum! {
    /// Primary occupation; selects the follow-up question set
    Occupation, "occupation" {
        Student => "Student",
        Farmer => "Farmer",
        SelfEmployed => "Self-Employed/Artisan",
        Unemployed => "Unemployed",
        SalariedEmployee => "Salaried Employee",
        SeniorCitizen => "Senior Citizen",
        Other => "Other",
    }
}

/// Occupation plus the fields that only make sense for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "occupation")]
pub enum OccupationDetails {
    Student {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        education_level: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        field_of_study: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        grades: Option<String>,
    },
    Farmer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        land_ownership: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        land_size: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crop_type: Option<String>,
    },
    #[serde(rename = "Self-Employed/Artisan")]
    SelfEmployed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        business_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        business_needs: Option<String>,
    },
    Unemployed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        highest_education: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        employment_seeking: Option<bool>,
    },
    #[serde(rename = "Salaried Employee")]
    SalariedEmployee {},
    #[serde(rename = "Senior Citizen")]
    SeniorCitizen {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pension_status: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        health_needs: Option<bool>,
    },
    Other {},
}

impl OccupationDetails {
    /// Details with no occupation-specific answers yet
    pub fn empty(occupation: Occupation) -> Self {
        match occupation {
            Occupation::Student => Self::Student {
                education_level: None,
                field_of_study: None,
                grades: None,
            },
            Occupation::Farmer => Self::Farmer {
                land_ownership: None,
                land_size: None,
                crop_type: None,
            },
            Occupation::SelfEmployed => Self::SelfEmployed {
                business_type: None,
                business_needs: None,
            },
            Occupation::Unemployed => Self::Unemployed {
                highest_education: None,
                employment_seeking: None,
            },
            Occupation::SalariedEmployee => Self::SalariedEmployee {},
            Occupation::SeniorCitizen => Self::SeniorCitizen {
                pension_status: None,
                health_needs: None,
            },
            Occupation::Other => Self::Other {},
        }
    }

    pub fn occupation(&self) -> Occupation {
        match self {
            Self::Student { .. } => Occupation::Student,
            Self::Farmer { .. } => Occupation::Farmer,
            Self::SelfEmployed { .. } => Occupation::SelfEmployed,
            Self::Unemployed { .. } => Occupation::Unemployed,
            Self::SalariedEmployee {} => Occupation::SalariedEmployee,
            Self::SeniorCitizen { .. } => Occupation::SeniorCitizen,
            Self::Other {} => Occupation::Other,
        }
    }

    /// Overlay the answered fields of `update`.
    ///
    /// Same occupation: only fields present in `update` change. A different
    /// occupation replaces the details outright.
    pub fn merge(&mut self, update: &OccupationDetails) {
        fn keep<T: Clone>(slot: &mut Option<T>, incoming: &Option<T>) {
            if incoming.is_some() {
                slot.clone_from(incoming);
            }
        }

        match (self, update) {
            (
                Self::Student { education_level, field_of_study, grades },
                Self::Student { education_level: e, field_of_study: f, grades: g },
            ) => {
                keep(education_level, e);
                keep(field_of_study, f);
                keep(grades, g);
            }
            (
                Self::Farmer { land_ownership, land_size, crop_type },
                Self::Farmer { land_ownership: o, land_size: s, crop_type: c },
            ) => {
                keep(land_ownership, o);
                keep(land_size, s);
                keep(crop_type, c);
            }
            (
                Self::SelfEmployed { business_type, business_needs },
                Self::SelfEmployed { business_type: t, business_needs: n },
            ) => {
                keep(business_type, t);
                keep(business_needs, n);
            }
            (
                Self::Unemployed { highest_education, employment_seeking },
                Self::Unemployed { highest_education: h, employment_seeking: s },
            ) => {
                keep(highest_education, h);
                keep(employment_seeking, s);
            }
            (
                Self::SeniorCitizen { pension_status, health_needs },
                Self::SeniorCitizen { pension_status: p, health_needs: h },
            ) => {
                keep(pension_status, p);
                keep(health_needs, h);
            }
            (current, incoming) => *current = incoming.clone(),
        }
    }
}

/// Persisted user profile, keyed by session identifier
///
/// Phase-1 fields are optional on the wire: the server accepts partial
/// submissions and the client does not second-guess it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub session_id: SessionId,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub social_category: Option<SocialCategory>,
    #[serde(default)]
    pub annual_income: Option<IncomeBand>,
    #[serde(default)]
    pub has_disability: Option<bool>,
    #[serde(flatten)]
    pub details: OccupationDetails,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn occupation(&self) -> Occupation {
        self.details.occupation()
    }

    /// Record as the server would create it from a first save.
    /// `None` when the update carries no occupation.
    pub fn from_update(update: &ProfileUpdate, now: DateTime<Utc>) -> Option<Self> {
        let details = update.details.clone()?;
        let mut profile = Self {
            session_id: update.session_id.clone(),
            state: None,
            gender: None,
            social_category: None,
            annual_income: None,
            has_disability: None,
            details,
            created_at: Some(now),
            updated_at: None,
        };
        profile.apply(update, now);
        profile.updated_at = None;
        Some(profile)
    }

    /// Apply the fields present in `update`; absent fields are left alone
    pub fn apply(&mut self, update: &ProfileUpdate, now: DateTime<Utc>) {
        if let Some(ref state) = update.state {
            self.state = Some(state.clone());
        }
        if update.gender.is_some() {
            self.gender = update.gender;
        }
        if update.social_category.is_some() {
            self.social_category = update.social_category;
        }
        if update.annual_income.is_some() {
            self.annual_income = update.annual_income;
        }
        if update.has_disability.is_some() {
            self.has_disability = update.has_disability;
        }
        if let Some(ref details) = update.details {
            self.details.merge(details);
        }
        self.updated_at = Some(now);
    }
}

/// Outgoing profile write. Absent fields are omitted from the body, which
/// the server reads as "leave unchanged".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileUpdate {
    pub session_id: SessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_category: Option<SocialCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_income: Option<IncomeBand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_disability: Option<bool>,
    #[serde(flatten)]
    pub details: Option<OccupationDetails>,
}

impl ProfileUpdate {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            state: None,
            gender: None,
            social_category: None,
            annual_income: None,
            has_disability: None,
            details: None,
        }
    }

    pub fn occupation(&self) -> Option<Occupation> {
        self.details.as_ref().map(OccupationDetails::occupation)
    }
}

/// Envelope of `GET /user/profile` and `POST /user/profile`
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileEnvelope {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub profile: Option<Profile>,
}

/// Envelope of `DELETE /user/profile`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusEnvelope {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Result of `GET /user/profile/exists`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileStatus {
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub is_complete: bool,
}

/// Parse a server timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| {
        parse_timestamp(&s).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", s)))
    })
    .transpose()
}
