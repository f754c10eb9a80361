//! Failure reporting
//!
//! Profile components never show failures to the user: a failed save leaves
//! the form where it was, a failed fetch keeps the previous record. The
//! detail goes to a single [`FailureReporter`] so hosts can decide what to
//! do with it. The default just logs.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::ClientError;
use crate::session::SessionId;

/// The operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SubmitPhase(u8),
    FetchProfile,
    SaveProfile,
    DeleteProfile,
    CheckExists,
    ClearSession,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::SubmitPhase(n) => write!(f, "submit phase {}", n),
            Operation::FetchProfile => f.write_str("fetch profile"),
            Operation::SaveProfile => f.write_str("save profile"),
            Operation::DeleteProfile => f.write_str("delete profile"),
            Operation::CheckExists => f.write_str("check profile exists"),
            Operation::ClearSession => f.write_str("clear session"),
        }
    }
}

/// Why it failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The backend answered but declined (false / `success: false`)
    Rejected,
    /// Transport, decoding, or conversion error
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub operation: Operation,
    pub session_id: SessionId,
    pub reason: FailureReason,
}

impl Failure {
    pub fn rejected(operation: Operation, session_id: &SessionId) -> Self {
        Self {
            operation,
            session_id: session_id.clone(),
            reason: FailureReason::Rejected,
        }
    }

    pub fn error(operation: Operation, session_id: &SessionId, error: &ClientError) -> Self {
        Self {
            operation,
            session_id: session_id.clone(),
            reason: FailureReason::Error(error.to_string()),
        }
    }
}

/// Sink for absorbed failures
pub trait FailureReporter: Send + Sync {
    fn report(&self, failure: Failure);
}

/// Logs failures through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, failure: Failure) {
        match failure.reason {
            FailureReason::Rejected => tracing::warn!(
                session_id = %failure.session_id,
                "{} was rejected by the backend",
                failure.operation
            ),
            FailureReason::Error(ref error) => tracing::error!(
                session_id = %failure.session_id,
                error = %error,
                "{} failed",
                failure.operation
            ),
        }
    }
}

/// Keeps every failure in memory
#[derive(Debug, Default)]
pub struct CollectingReporter {
    failures: Mutex<Vec<Failure>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<Failure> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FailureReporter for CollectingReporter {
    fn report(&self, failure: Failure) {
        TracingReporter.report(failure.clone());
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }
}
