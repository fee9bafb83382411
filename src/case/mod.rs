//! # Case Workflow
//!
//! The concrete case sequences run by the orchestrator: domain payloads, the
//! repository holding each step's private durable state, the steps themselves
//! and the registry mapping a [`SequenceKind`](crate::context::SequenceKind)
//! to its fixed composition.

pub mod domain;
pub mod postgres;
pub mod repository;
pub mod sequences;
pub mod steps;

pub use domain::{ApprovalNeed, CasePayload, DecisionMade, PeriodKey, PeriodType, Warning};
pub use postgres::PgCaseRepository;
pub use repository::{CaseRepository, InMemoryCaseRepository};
pub use sequences::SequenceRegistry;
pub use steps::{
    CompleteTaskStep, FetchGuardianshipStep, FetchOpenManualTasksStep, FetchRiskAssessmentStep,
    FinalizeReviewStep,
};
