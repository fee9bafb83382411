//! # Sequences
//!
//! Ordered composition of steps. A [`Sequence`] has no stored position: each
//! run scans its steps in declaration order, skips the ones whose effect is
//! already durable and stops at the first step that suspends. Sequences are
//! steps themselves, so nesting is transparent.
//!
//! [`Gather`] composes independent steps that may all be waiting for answers
//! at the same time: it attempts every step not yet applied in one pass and
//! only reports done when all of them are.

use super::step::{RunMode, Step, StepOutcome};
use crate::context::ExecutionContext;
use crate::error::{CaseworkError, Result};
use crate::logging::log_step_operation;
use async_trait::async_trait;

/// Keep typed errors typed; anything else is attributed to the failing step.
fn step_failure(ctx: &ExecutionContext, step: &dyn Step, error: CaseworkError) -> CaseworkError {
    match error {
        CaseworkError::Domain(_)
        | CaseworkError::Transient(_)
        | CaseworkError::ValidationError(_)
        | CaseworkError::StepFailed { .. } => error,
        other => CaseworkError::StepFailed {
            correlation_id: ctx.correlation_id(),
            step: step.name().to_string(),
            reason: other.to_string(),
        },
    }
}

pub struct Sequence {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn then(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn with_steps(name: impl Into<String>, steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run the sequence from its first step whose effect is missing.
    ///
    /// Only that first step is entered in `mode`; steps reached after it in the
    /// same pass have never run before and are executed. Errors are not caught:
    /// nothing after a failing step runs.
    pub async fn run(&self, ctx: &mut ExecutionContext, mode: RunMode) -> Result<StepOutcome> {
        let mut mode = mode;

        for step in &self.steps {
            if step
                .is_applied(ctx)
                .await
                .map_err(|e| step_failure(ctx, step.as_ref(), e))?
            {
                log_step_operation("skip", ctx.correlation_id(), step.name(), "applied", None);
                continue;
            }

            let outcome = step
                .attempt(ctx, mode)
                .await
                .map_err(|e| step_failure(ctx, step.as_ref(), e))?;
            mode = RunMode::Execute;

            match outcome {
                StepOutcome::Done => {
                    log_step_operation("attempt", ctx.correlation_id(), step.name(), "done", None);
                }
                StepOutcome::Suspended => {
                    log_step_operation(
                        "attempt",
                        ctx.correlation_id(),
                        step.name(),
                        "suspended",
                        Some(self.name.as_str()),
                    );
                    return Ok(StepOutcome::Suspended);
                }
            }
        }

        Ok(StepOutcome::Done)
    }
}

#[async_trait]
impl Step for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_applied(&self, ctx: &ExecutionContext) -> Result<bool> {
        for step in &self.steps {
            if !step
                .is_applied(ctx)
                .await
                .map_err(|e| step_failure(ctx, step.as_ref(), e))?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        self.run(ctx, RunMode::Execute).await
    }

    async fn resume(&self, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        self.run(ctx, RunMode::Resume).await
    }
}

pub struct Gather {
    name: String,
    steps: Vec<Box<dyn Step>>,
}

impl Gather {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn with(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Attempt every step not yet applied, in declaration order.
    pub async fn run(&self, ctx: &mut ExecutionContext, mode: RunMode) -> Result<StepOutcome> {
        let mut outcome = StepOutcome::Done;

        for step in &self.steps {
            if step
                .is_applied(ctx)
                .await
                .map_err(|e| step_failure(ctx, step.as_ref(), e))?
            {
                continue;
            }

            let step_outcome = step
                .attempt(ctx, mode)
                .await
                .map_err(|e| step_failure(ctx, step.as_ref(), e))?;
            log_step_operation(
                "gather",
                ctx.correlation_id(),
                step.name(),
                if step_outcome.is_done() { "done" } else { "suspended" },
                Some(self.name.as_str()),
            );

            if step_outcome == StepOutcome::Suspended {
                outcome = StepOutcome::Suspended;
            }
        }

        Ok(outcome)
    }
}

#[async_trait]
impl Step for Gather {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_applied(&self, ctx: &ExecutionContext) -> Result<bool> {
        for step in &self.steps {
            if !step
                .is_applied(ctx)
                .await
                .map_err(|e| step_failure(ctx, step.as_ref(), e))?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        self.run(ctx, RunMode::Execute).await
    }

    async fn resume(&self, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        self.run(ctx, RunMode::Resume).await
    }
}
