//! # Case Steps
//!
//! Lookup steps record an external answer in the case repository, which is
//! also where they check whether they already ran. The finalization steps
//! drive the two-person review and the task state machines.

use super::domain::{ApprovalNeed, DecisionMade};
use super::repository::CaseRepository;
use crate::constants::events;
use crate::context::{
    ExecutionContext, GuardianshipStatus, OpenManualTasks, Request, RiskAssessment,
};
use crate::error::{CaseworkError, Result};
use crate::orchestration::step::{Step, StepOutcome};
use crate::state_machine::{TaskEvent, TaskStateMachine};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

pub(crate) fn approval_need(ctx: &ExecutionContext) -> Result<&ApprovalNeed> {
    ctx.payload().as_approval().ok_or_else(|| {
        CaseworkError::Internal(format!(
            "Context {} does not carry an approval need",
            ctx.correlation_id()
        ))
    })
}

fn decision_made(ctx: &ExecutionContext) -> Result<&DecisionMade> {
    ctx.payload().as_finalization().ok_or_else(|| {
        CaseworkError::Internal(format!(
            "Context {} does not carry a decision",
            ctx.correlation_id()
        ))
    })
}

/// Records the risk assessment verdict for the case period
pub struct FetchRiskAssessmentStep {
    repository: Arc<dyn CaseRepository>,
}

impl FetchRiskAssessmentStep {
    pub fn new(repository: Arc<dyn CaseRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Step for FetchRiskAssessmentStep {
    fn name(&self) -> &str {
        "fetch_risk_assessment"
    }

    async fn is_applied(&self, ctx: &ExecutionContext) -> Result<bool> {
        let need = approval_need(ctx)?;
        Ok(self
            .repository
            .risk_assessment(&need.period_key())
            .await?
            .is_some())
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        let need = approval_need(ctx)?.clone();

        // A verdict for another case period never counts as this one's
        match ctx
            .answer::<RiskAssessment>()
            .filter(|risk| risk.vedtaksperiode_id == need.vedtaksperiode_id)
        {
            Some(risk) => {
                self.repository
                    .save_risk_assessment(&need.period_key(), risk)
                    .await?;
                debug!(
                    correlation_id = %ctx.correlation_id(),
                    may_auto_approve = risk.may_auto_approve,
                    "Risk assessment recorded"
                );
                Ok(StepOutcome::Done)
            }
            None => {
                ctx.request(Request::RiskAssessment {
                    vedtaksperiode_id: need.vedtaksperiode_id,
                    fnr: need.fnr,
                    organization_number: need.organization_number,
                });
                Ok(StepOutcome::Suspended)
            }
        }
    }
}

/// Records whether the person has a guardian or power of attorney
pub struct FetchGuardianshipStep {
    repository: Arc<dyn CaseRepository>,
}

impl FetchGuardianshipStep {
    pub fn new(repository: Arc<dyn CaseRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Step for FetchGuardianshipStep {
    fn name(&self) -> &str {
        "fetch_guardianship"
    }

    async fn is_applied(&self, ctx: &ExecutionContext) -> Result<bool> {
        let need = approval_need(ctx)?;
        Ok(self
            .repository
            .guardianship(&need.period_key())
            .await?
            .is_some())
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        let need = approval_need(ctx)?.clone();

        match ctx.answer::<GuardianshipStatus>() {
            Some(status) => {
                self.repository
                    .save_guardianship(&need.period_key(), status)
                    .await?;
                Ok(StepOutcome::Done)
            }
            None => {
                ctx.request(Request::Guardianship { fnr: need.fnr });
                Ok(StepOutcome::Suspended)
            }
        }
    }
}

/// Records how many externally tracked manual tasks the person has open
pub struct FetchOpenManualTasksStep {
    repository: Arc<dyn CaseRepository>,
}

impl FetchOpenManualTasksStep {
    pub fn new(repository: Arc<dyn CaseRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Step for FetchOpenManualTasksStep {
    fn name(&self) -> &str {
        "fetch_open_manual_tasks"
    }

    async fn is_applied(&self, ctx: &ExecutionContext) -> Result<bool> {
        let need = approval_need(ctx)?;
        Ok(self
            .repository
            .open_manual_tasks(&need.period_key())
            .await?
            .is_some())
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        let need = approval_need(ctx)?.clone();

        match ctx.answer::<OpenManualTasks>() {
            Some(open) => {
                self.repository
                    .save_open_manual_tasks(&need.period_key(), open.count)
                    .await?;
                Ok(StepOutcome::Done)
            }
            None => {
                ctx.request(Request::OpenManualTasks {
                    aktor_id: need.aktor_id,
                });
                Ok(StepOutcome::Suspended)
            }
        }
    }
}

/// Approves the two-person review with the decision's approver.
///
/// A case period without a review needed none and passes straight through.
pub struct FinalizeReviewStep {
    repository: Arc<dyn CaseRepository>,
}

impl FinalizeReviewStep {
    pub fn new(repository: Arc<dyn CaseRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Step for FinalizeReviewStep {
    fn name(&self) -> &str {
        "finalize_review"
    }

    async fn is_applied(&self, ctx: &ExecutionContext) -> Result<bool> {
        let decision = decision_made(ctx)?;
        Ok(self
            .repository
            .review(decision.vedtaksperiode_id)
            .await?
            .map_or(true, |review| review.is_finalized()))
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        let decision = decision_made(ctx)?;

        let Some(mut review) = self.repository.review(decision.vedtaksperiode_id).await? else {
            return Ok(StepOutcome::Done);
        };

        review.finalize(&decision.approver, &decision.payment_reference)?;
        self.repository.save_review(&review).await?;

        info!(
            correlation_id = %ctx.correlation_id(),
            review_id = %review.review_id,
            "Two-person review finalized"
        );
        Ok(StepOutcome::Done)
    }
}

/// Completes the open task for the case period
pub struct CompleteTaskStep {
    repository: Arc<dyn CaseRepository>,
}

impl CompleteTaskStep {
    pub fn new(repository: Arc<dyn CaseRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Step for CompleteTaskStep {
    fn name(&self) -> &str {
        "complete_task"
    }

    async fn is_applied(&self, ctx: &ExecutionContext) -> Result<bool> {
        let decision = decision_made(ctx)?;
        Ok(self
            .repository
            .open_task(decision.vedtaksperiode_id)
            .await?
            .is_none())
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        let decision = decision_made(ctx)?.clone();

        let Some(task) = self.repository.open_task(decision.vedtaksperiode_id).await? else {
            return Ok(StepOutcome::Done);
        };

        let mut machine = TaskStateMachine::new(task);
        machine.transition(TaskEvent::Complete)?;
        let task = machine.into_task();
        self.repository.save_task(&task).await?;

        ctx.notify(
            events::CASE_FINALIZED,
            json!({
                "vedtaksperiode_id": decision.vedtaksperiode_id,
                "task_id": task.task_id,
                "payment_reference": decision.payment_reference,
            }),
        );
        Ok(StepOutcome::Done)
    }
}
