//! # Orchestration Engine
//!
//! The resumable command-orchestration core.
//!
//! ## Architecture
//!
//! A case workflow is a fixed [`Sequence`] of [`Step`]s. A step either applies
//! its effect or registers a request for outside information and suspends.
//! Suspension never blocks: the [`Orchestrator`] persists the context, commits,
//! publishes the new requests and returns to the message loop. A later answer
//! for the same correlation id rehydrates the context and resumes the sequence
//! at its first incomplete step.
//!
//! ## Core Components
//!
//! - **Step / Sequence / Gather**: composition and suspend/resume scanning
//! - **Orchestrator**: one locked pass per domain event, publish after commit
//! - **ContextObserver**: listeners drained after a committed pass
//! - **Consumer**: bounded worker pool over the inbound queue
//! - **Housekeeping**: request republishing and terminal-context retention

pub mod consumer;
pub mod event;
pub mod housekeeping;
pub mod observer;
pub mod orchestrator;
pub mod sequence;
pub mod step;

pub use consumer::{BatchSummary, Consumer, ConsumerConfig, Disposition};
pub use event::{DomainEvent, DomainEventKind};
pub use housekeeping::{Housekeeping, HousekeepingSummary};
pub use observer::{ContextObserver, TaskInvalidationObserver};
pub use orchestrator::{Orchestrator, PassOutcome};
pub use sequence::{Gather, Sequence};
pub use step::{RunMode, Step, StepOutcome};
