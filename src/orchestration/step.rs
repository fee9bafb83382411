//! # Step
//!
//! The atomic unit of work in a sequence. Steps are stateless descriptions:
//! whether a step has already run is never stored, it is recomputed every pass
//! from durable state the step owns privately ([`Step::is_applied`]).

use crate::context::ExecutionContext;
use crate::error::Result;
use async_trait::async_trait;

/// Result of attempting a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step's effect is durable
    Done,
    /// The step registered a request and cannot continue without its answer
    Suspended,
}

impl StepOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// How a step is entered in this pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// First run for this context
    Execute,
    /// Re-entry after an earlier pass suspended
    Resume,
}

#[async_trait]
pub trait Step: Send + Sync {
    /// Stable name for logs and failure records
    fn name(&self) -> &str;

    /// Whether this step's durable effect already exists. Applied steps are
    /// skipped without side effects.
    async fn is_applied(&self, ctx: &ExecutionContext) -> Result<bool>;

    /// First entry. Either applies the effect and returns [`StepOutcome::Done`],
    /// or registers exactly one request on the context and returns
    /// [`StepOutcome::Suspended`].
    async fn execute(&self, ctx: &mut ExecutionContext) -> Result<StepOutcome>;

    /// Re-entry after suspension. Looks for the answer on the context, applies
    /// the effect when present, otherwise re-registers its request.
    async fn resume(&self, ctx: &mut ExecutionContext) -> Result<StepOutcome> {
        self.execute(ctx).await
    }

    /// Enter the step in `mode`
    async fn attempt(&self, ctx: &mut ExecutionContext, mode: RunMode) -> Result<StepOutcome> {
        match mode {
            RunMode::Execute => self.execute(ctx).await,
            RunMode::Resume => self.resume(ctx).await,
        }
    }
}
