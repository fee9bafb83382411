//! # Error Types
//!
//! Crate-wide error taxonomy. Every failure that reaches the orchestrator is
//! classified into one of four classes so callers can react specifically:
//!
//! - **Validation**: malformed or unroutable input, rejected before a context exists
//! - **DomainRule**: expected, named rule violations (409-class, never retried)
//! - **Transient**: contention or an unavailable dependency, safe to redeliver
//! - **Fatal**: unexpected faults, parked until an operator replays them

use crate::config::ConfigurationError;
use crate::messaging::MessagingError;
use crate::state_machine::StateMachineError;
use crate::store::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CaseworkError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Domain rule violated: {0}")]
    Domain(#[from] DomainError),
    #[error("Transient error: {0}")]
    Transient(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Messaging error: {0}")]
    MessagingError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Step {step} failed for context {correlation_id}: {reason}")]
    StepFailed {
        correlation_id: Uuid,
        step: String,
        reason: String,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CaseworkError>;

/// Expected, named violations of case workflow rules.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DomainError {
    #[error("Reviewer {reviewer} cannot review a decision they submitted")]
    ReviewerIsSubmitter { reviewer: String },
    #[error("Two-person review {review_id} has already been returned")]
    ReviewAlreadyReturned { review_id: Uuid },
    #[error("Two-person review {review_id} has already been sent to a decision-maker")]
    ReviewAlreadySentToReviewer { review_id: Uuid },
    #[error("Two-person review {review_id} is already finalized")]
    ReviewAlreadyFinalized { review_id: Uuid },
    #[error("Two-person review {review_id} is not awaiting a second reviewer")]
    ReviewNotAwaitingReviewer { review_id: Uuid },
    #[error("Task {task_id} is not assigned")]
    TaskNotAssigned { task_id: Uuid },
    #[error("Task {task_id} is already assigned to {assignee}")]
    TaskAlreadyAssigned { task_id: Uuid, assignee: String },
    #[error("Task {task_id} cannot go from {from} on {event}")]
    InvalidTaskTransition {
        task_id: Uuid,
        from: String,
        event: String,
    },
    #[error("No open task for case period {vedtaksperiode_id}")]
    TaskNotFound { vedtaksperiode_id: Uuid },
    #[error("No two-person review for case period {vedtaksperiode_id}")]
    ReviewNotFound { vedtaksperiode_id: Uuid },
}

impl DomainError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ReviewerIsSubmitter { .. } => "reviewer_is_submitter",
            Self::ReviewAlreadyReturned { .. } => "review_already_returned",
            Self::ReviewAlreadySentToReviewer { .. } => "review_already_sent_to_reviewer",
            Self::ReviewAlreadyFinalized { .. } => "review_already_finalized",
            Self::ReviewNotAwaitingReviewer { .. } => "review_not_awaiting_reviewer",
            Self::TaskNotAssigned { .. } => "task_not_assigned",
            Self::TaskAlreadyAssigned { .. } => "task_already_assigned",
            Self::InvalidTaskTransition { .. } => "invalid_task_transition",
            Self::TaskNotFound { .. } => "task_not_found",
            Self::ReviewNotFound { .. } => "review_not_found",
        }
    }

    /// HTTP-style status a query/command API would answer with.
    pub fn client_status(&self) -> u16 {
        match self {
            Self::TaskNotFound { .. } | Self::ReviewNotFound { .. } => 404,
            _ => 409,
        }
    }
}

/// Class of an error, deciding persistence vs propagation in the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    DomainRule,
    Transient,
    Fatal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::DomainRule => write!(f, "domain_rule"),
            Self::Transient => write!(f, "transient"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

impl CaseworkError {
    pub fn classify(&self) -> ErrorClass {
        match self {
            Self::ValidationError(_) => ErrorClass::Validation,
            Self::Domain(_) => ErrorClass::DomainRule,
            Self::Transient(_) => ErrorClass::Transient,
            Self::DatabaseError(_)
            | Self::MessagingError(_)
            | Self::ConfigurationError(_)
            | Self::StepFailed { .. }
            | Self::Internal(_) => ErrorClass::Fatal,
        }
    }

    /// Status code exposed to clients.
    pub fn client_status(&self) -> u16 {
        match self {
            Self::ValidationError(_) => 400,
            Self::Domain(e) => e.client_status(),
            Self::Transient(_) => 503,
            _ => 500,
        }
    }

    /// Message exposed to clients. Fatal errors never leak internal detail.
    pub fn client_message(&self) -> String {
        match self.classify() {
            ErrorClass::Fatal => "Internal error".to_string(),
            ErrorClass::Transient => "Temporarily unavailable, retry later".to_string(),
            _ => self.to_string(),
        }
    }

    /// The domain error carried by this error, if any.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CaseworkError {
    fn from(error: serde_json::Error) -> Self {
        CaseworkError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for CaseworkError {
    fn from(err: sqlx::Error) -> Self {
        CaseworkError::DatabaseError(err.to_string())
    }
}

impl From<MessagingError> for CaseworkError {
    fn from(error: MessagingError) -> Self {
        match error {
            MessagingError::Validation { .. } => CaseworkError::ValidationError(error.to_string()),
            _ => CaseworkError::MessagingError(error.to_string()),
        }
    }
}

impl From<StoreError> for CaseworkError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::LockConflict { .. } => CaseworkError::Transient(error.to_string()),
            _ => CaseworkError::DatabaseError(error.to_string()),
        }
    }
}

impl From<ConfigurationError> for CaseworkError {
    fn from(error: ConfigurationError) -> Self {
        CaseworkError::ConfigurationError(error.to_string())
    }
}

impl From<StateMachineError> for CaseworkError {
    fn from(error: StateMachineError) -> Self {
        match error {
            StateMachineError::Domain(e) => CaseworkError::Domain(e),
            other => CaseworkError::Internal(other.to_string()),
        }
    }
}
