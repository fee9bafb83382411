use super::{
    errors::StateMachineResult,
    events::ReviewEvent,
    guards::{DistinctReviewerGuard, StateGuard},
    states::ReviewState,
};
use crate::case::domain::PeriodKey;
use crate::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Two-person review (totrinnsvurdering) of a manual decision.
///
/// The approving caseworker can never be the submitting caseworker, and a
/// returning caseworker can never be the original submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoPersonReview {
    pub review_id: Uuid,
    pub period: PeriodKey,
    pub state: ReviewState,
    pub submitter: Option<String>,
    /// Second caseworker the review was submitted to
    pub reviewer: Option<String>,
    pub approver: Option<String>,
    /// Set when a second caseworker sent the decision back
    pub returned: bool,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TwoPersonReview {
    pub fn new(period: PeriodKey) -> Self {
        let now = Utc::now();
        Self {
            review_id: Uuid::now_v7(),
            period,
            state: ReviewState::default(),
            submitter: None,
            reviewer: None,
            approver: None,
            returned: false,
            payment_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.state == ReviewState::Finalized
    }

    /// Apply a review event
    pub fn apply(&mut self, event: ReviewEvent) -> StateMachineResult<ReviewState> {
        match event {
            ReviewEvent::SubmitToReviewer {
                submitter,
                reviewer,
            } => self.submit_to_reviewer(&submitter, &reviewer),
            ReviewEvent::Return { reviewer } => self.return_to_submitter(&reviewer),
            ReviewEvent::Finalize {
                approver,
                payment_reference,
            } => self.finalize(&approver, &payment_reference),
        }
    }

    /// Submit the decision to a second caseworker
    pub fn submit_to_reviewer(
        &mut self,
        submitter: &str,
        reviewer: &str,
    ) -> StateMachineResult<ReviewState> {
        if submitter == reviewer {
            return Err(DomainError::ReviewerIsSubmitter {
                reviewer: reviewer.to_string(),
            }
            .into());
        }
        match self.state {
            ReviewState::AwaitingReview | ReviewState::Returned => {}
            ReviewState::AwaitingSecondReviewer => {
                return Err(DomainError::ReviewAlreadySentToReviewer {
                    review_id: self.review_id,
                }
                .into())
            }
            ReviewState::Finalized => return Err(self.already_finalized()),
        }

        self.submitter = Some(submitter.to_string());
        self.reviewer = Some(reviewer.to_string());
        self.returned = false;
        self.transition_to(ReviewState::AwaitingSecondReviewer);
        Ok(self.state)
    }

    /// Second caseworker sends the decision back to the submitter
    pub fn return_to_submitter(&mut self, reviewer: &str) -> StateMachineResult<ReviewState> {
        self.ensure_awaiting_reviewer()?;
        DistinctReviewerGuard { actor: reviewer }.check(self)?;

        self.reviewer = Some(reviewer.to_string());
        self.returned = true;
        self.transition_to(ReviewState::Returned);
        Ok(self.state)
    }

    /// Second caseworker approves the decision
    pub fn finalize(
        &mut self,
        approver: &str,
        payment_reference: &str,
    ) -> StateMachineResult<ReviewState> {
        self.ensure_awaiting_reviewer()?;
        DistinctReviewerGuard { actor: approver }.check(self)?;

        self.approver = Some(approver.to_string());
        self.payment_reference = Some(payment_reference.to_string());
        self.transition_to(ReviewState::Finalized);
        Ok(self.state)
    }

    fn ensure_awaiting_reviewer(&self) -> StateMachineResult<()> {
        match self.state {
            ReviewState::AwaitingSecondReviewer => Ok(()),
            ReviewState::Returned => Err(DomainError::ReviewAlreadyReturned {
                review_id: self.review_id,
            }
            .into()),
            ReviewState::Finalized => Err(self.already_finalized()),
            ReviewState::AwaitingReview => Err(DomainError::ReviewNotAwaitingReviewer {
                review_id: self.review_id,
            }
            .into()),
        }
    }

    fn already_finalized(&self) -> super::StateMachineError {
        DomainError::ReviewAlreadyFinalized {
            review_id: self.review_id,
        }
        .into()
    }

    fn transition_to(&mut self, target: ReviewState) {
        tracing::debug!(
            review_id = %self.review_id,
            from = %self.state,
            to = %target,
            "Two-person review transition"
        );
        self.state = target;
        self.updated_at = Utc::now();
    }
}
