use super::sampling::{SamplingDraw, SamplingPolicy};
use super::{AutomationSignals, Decision, DecisionEngine, DecisionRecord};
use crate::case::repository::CaseRepository;
use crate::case::steps::approval_need;
use crate::constants::events;
use crate::context::ExecutionContext;
use crate::error::Result;
use crate::logging::{audit_decision, audit_sampling};
use crate::orchestration::step::{Step, StepOutcome};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Terminal step of the approval sequence: routes the case to automatic
/// approval or to a caseworker, and records why.
pub struct AutomaticApprovalStep {
    repository: Arc<dyn CaseRepository>,
    engine: DecisionEngine,
    sampling: Arc<dyn SamplingPolicy>,
}

impl AutomaticApprovalStep {
    pub fn new(
        repository: Arc<dyn CaseRepository>,
        engine: DecisionEngine,
        sampling: Arc<dyn SamplingPolicy>,
    ) -> Self {
        Self {
            repository,
            engine,
            sampling,
        }
    }

    async fn collect_signals(&self, ctx: &ExecutionContext) -> Result<AutomationSignals> {
        let need = approval_need(ctx)?;
        let period = need.period_key();

        let manual_override_in_flight = self
            .repository
            .open_task(need.vedtaksperiode_id)
            .await?
            .is_some()
            || self
                .repository
                .review(need.vedtaksperiode_id)
                .await?
                .is_some_and(|review| !review.state.is_terminal());

        Ok(AutomationSignals {
            risk: self.repository.risk_assessment(&period).await?,
            active_warnings: need.active_warning_codes(),
            guardianship: self.repository.guardianship(&period).await?,
            open_manual_tasks: self.repository.open_manual_tasks(&period).await?,
            manual_override_in_flight,
            sampled: false,
        })
    }

    async fn decide(&self, ctx: &ExecutionContext) -> Result<DecisionRecord> {
        let period = approval_need(ctx)?.period_key();
        let mut signals = self.collect_signals(ctx).await?;

        // Sampling only applies to cases that would otherwise go through
        if self.engine.blocking_reasons(&signals).is_empty() {
            signals.sampled = self.sampled(ctx).await?;
        }

        Ok(DecisionRecord {
            period,
            decision: self.engine.decide(&signals),
            signals,
            decided_at: Utc::now(),
        })
    }

    /// The case period's sampling outcome, drawn on first use
    async fn sampled(&self, ctx: &ExecutionContext) -> Result<bool> {
        let vedtaksperiode_id = ctx.payload().vedtaksperiode_id();

        if let Some(existing) = self.repository.sampling_draw(vedtaksperiode_id).await? {
            return Ok(existing.sampled);
        }

        let draw = SamplingDraw::draw(vedtaksperiode_id, self.sampling.as_ref());
        let stored = self.repository.record_sampling_draw(&draw).await?;
        audit_sampling(vedtaksperiode_id, &stored.policy, stored.roll, stored.sampled);
        Ok(stored.sampled)
    }
}

#[async_trait]
impl Step for AutomaticApprovalStep {
    fn name(&self) -> &str {
        "automatic_approval_decision"
    }

    /// Applied once the decision is on record and, for a manual decision,
    /// its task exists.
    async fn is_applied(&self, ctx: &ExecutionContext) -> Result<bool> {
        let period = approval_need(ctx)?.period_key();
        match self.repository.decision(&period).await? {
            None => Ok(false),
            Some(record) if record.decision.is_automatic() => Ok(true),
            Some(_) => Ok(self.repository.task_for_period(&period).await?.is_some()),
        }
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        let period = approval_need(ctx)?.period_key();

        // A decision on record means an earlier attempt stopped before the
        // task existed. Its signals stand; they are not collected again.
        let record = match self.repository.decision(&period).await? {
            Some(record) => record,
            None => {
                let record = self.decide(ctx).await?;
                self.repository.save_decision(&record).await?;
                record
            }
        };
        let decision = &record.decision;

        let task_id = match decision {
            Decision::Automatic => None,
            Decision::Manual { .. } => Some(self.repository.create_task(&period).await?.task_id),
        };

        let reasons: Vec<&str> = decision.reasons().iter().map(|r| r.code()).collect();
        info!(
            correlation_id = %ctx.correlation_id(),
            vedtaksperiode_id = %period.vedtaksperiode_id,
            automatic = decision.is_automatic(),
            reasons = ?reasons,
            "Case routed"
        );
        audit_decision(
            ctx.correlation_id(),
            period.vedtaksperiode_id,
            &serde_json::to_value(&record)?,
        );

        match task_id {
            None => ctx.notify(
                events::CASE_AUTO_APPROVED,
                json!({
                    "vedtaksperiode_id": period.vedtaksperiode_id,
                    "utbetaling_id": period.utbetaling_id,
                }),
            ),
            Some(task_id) => ctx.notify(
                events::CASE_ROUTED_TO_MANUAL,
                json!({
                    "vedtaksperiode_id": period.vedtaksperiode_id,
                    "utbetaling_id": period.utbetaling_id,
                    "task_id": task_id,
                    "reasons": reasons,
                }),
            ),
        }

        Ok(StepOutcome::Done)
    }
}
