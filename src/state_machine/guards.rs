use super::errors::{business_rule_violation, GuardResult};
use super::review_state_machine::TwoPersonReview;
use super::task_state_machine::CaseTask;
use crate::error::DomainError;

/// Trait for implementing state transition guards
pub trait StateGuard<T> {
    /// Check if a transition is allowed
    fn check(&self, entity: &T) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Guard requiring a caseworker on the task before it can go to a second reviewer
pub struct TaskAssignedGuard;

impl StateGuard<CaseTask> for TaskAssignedGuard {
    fn check(&self, task: &CaseTask) -> GuardResult<()> {
        if task.assignee.is_none() {
            return Err(business_rule_violation(DomainError::TaskNotAssigned {
                task_id: task.task_id,
            }));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Task must be assigned to a caseworker"
    }
}

/// Guard requiring that the acting caseworker is not the one who submitted
/// the decision. Holds for every review transition.
pub struct DistinctReviewerGuard<'a> {
    pub actor: &'a str,
}

impl StateGuard<TwoPersonReview> for DistinctReviewerGuard<'_> {
    fn check(&self, review: &TwoPersonReview) -> GuardResult<()> {
        if review.submitter.as_deref() == Some(self.actor) {
            return Err(business_rule_violation(DomainError::ReviewerIsSubmitter {
                reviewer: self.actor.to_string(),
            }));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "Reviewer must differ from the submitting caseworker"
    }
}
