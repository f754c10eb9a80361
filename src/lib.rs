//! Client core for the NeethiSaarathi legal assistant
//!
//! Collects a user profile through a two-phase questionnaire, manages the
//! stored profile (view, edit, delete), and asks the legal Q&A agent.
//! Profiles are keyed by an anonymous session id kept in local storage.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use neethisaarathi::{
//!     ClientConfig, FileSessionStore, Host, HttpProfileBackend, Identity, View,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let identity = Arc::new(Identity::new(Arc::new(FileSessionStore::new(
//!     config.session.storage_path(),
//! ))));
//! let backend = Arc::new(HttpProfileBackend::new(&config.api)?);
//!
//! let host = Host::new(identity, backend);
//! let boot = host.boot().await?;
//!
//! match boot.view {
//!     View::Questionnaire => {
//!         let form = host.questionnaire(boot.session_id, || println!("Profile complete"));
//!         form.set_answer("occupation", "Student").await;
//!         form.submit_phase().await;
//!     }
//!     View::Profile => {
//!         let manager = host.profile_manager(boot.session_id);
//!         manager.mount().await;
//!         println!("{:?}", manager.profile().await);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod ask;
pub mod config;
pub mod error;
pub mod host;
pub mod lifetime;
pub mod manager;
pub mod profile;
pub mod questionnaire;
pub mod report;
pub mod session;

// Re-export main types
pub use ask::{AgentAnswer, AgentClient, Source};
pub use config::{ApiConfig, ClientConfig, SessionConfig};
pub use error::{ClientError, Result};
pub use host::{Boot, Host, View};
pub use lifetime::Lifetime;
pub use manager::{AlwaysConfirm, Confirm, DeleteOutcome, ProfileManager, ProfileView, SaveOutcome};
pub use profile::{
    HttpProfileBackend, MemoryProfileBackend, Occupation, OccupationDetails, Profile,
    ProfileBackend, ProfileStatus, ProfileUpdate, SaveFailure, SaveProfile,
};
pub use questionnaire::{AnswerValue, Answers, Phase, Question, QuestionKind, Questionnaire, SubmitOutcome};
pub use report::{CollectingReporter, Failure, FailureReason, FailureReporter, Operation, TracingReporter};
pub use session::{FileSessionStore, Identity, MemorySessionStore, SessionId, SessionStore};
