// State machine module for case workflow outcome entities
//
// Pure transition tables for the task (oppgave) lifecycle and the two-person
// review (totrinnsvurdering). Persistence goes through the case repository;
// rule violations surface as typed domain errors.

pub mod errors;
pub mod events;
pub mod guards;
pub mod review_state_machine;
pub mod states;
pub mod task_state_machine;

// Re-export main types for convenient access
pub use errors::{GuardError, StateMachineError, StateMachineResult};
pub use events::{ReviewEvent, TaskEvent};
pub use review_state_machine::TwoPersonReview;
pub use states::{ReviewState, TaskState};
pub use task_state_machine::{CaseTask, TaskStateMachine};

// Common traits and utilities
pub use guards::StateGuard;
