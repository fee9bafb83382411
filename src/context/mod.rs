//! # Execution Context
//!
//! Per-workflow-instance state keyed by correlation id: the originating case
//! payload, collected answers, requests registered during the current pass and
//! an outbox of notifications the orchestrator drains after commit.

pub mod answers;
pub mod execution_context;
pub mod requests;
pub mod snapshot;

pub use answers::{
    Answer, AnswerKind, AnswerPayload, AnswerRegistry, GuardianshipStatus, OpenManualTasks,
    RiskAssessment,
};
pub use execution_context::{ExecutionContext, Notification};
pub use requests::Request;
pub use snapshot::{ContextSnapshot, ContextStatus, FailureRecord, SequenceKind};
