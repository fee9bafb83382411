use crate::error::DomainError;
use thiserror::Error;

/// Error types for state machine operations
#[derive(Error, Debug)]
pub enum StateMachineError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Guard condition failed: {reason}")]
    GuardFailed { reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specific error type for guard condition failures
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Business rule violation: {0}")]
    BusinessRuleViolation(DomainError),

    #[error("Invalid state for guard check: {state}")]
    InvalidState { state: String },
}

impl From<GuardError> for StateMachineError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::BusinessRuleViolation(domain) => Self::Domain(domain),
            other => Self::GuardFailed {
                reason: other.to_string(),
            },
        }
    }
}

/// Result type alias for state machine operations
pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type GuardResult<T> = Result<T, GuardError>;

/// Helper function to create business rule violations
pub fn business_rule_violation(rule: DomainError) -> GuardError {
    GuardError::BusinessRuleViolation(rule)
}
