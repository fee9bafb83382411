#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Casework Core
//!
//! Resumable command orchestration for welfare-benefit case events.
//!
//! ## Overview
//!
//! Incoming case events (an approval is needed, a decision has been made, an
//! answer to an earlier request has arrived) are turned into an ordered
//! sequence of steps. A step that lacks information registers a request for
//! it and the whole sequence suspends. The execution context is persisted,
//! the requests are published after commit, and the worker moves on. When the
//! answers arrive the context is rehydrated and the sequence resumes from its
//! first incomplete step.
//!
//! ## Key Features
//!
//! - **Idempotent steps**: each step knows whether its effect is already applied
//! - **Non-blocking suspension**: no worker waits on an outstanding request
//! - **Serialized contexts**: one pass per correlation id at a time
//! - **Publish after commit**: requests and notifications leave only committed passes
//! - **Automatic approval**: a pure decision engine plus persisted random sampling
//! - **Task and review state machines**: guarded transitions for manual work
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Steps, sequences, the orchestrator and the queue consumer
//! - [`context`] - Execution context, answers, requests and persisted snapshots
//! - [`store`] - Locked context persistence (in-memory and PostgreSQL)
//! - [`case`] - Case payloads, the case repository and the concrete case steps
//! - [`decision`] - Automatic-approval decision engine and sampling
//! - [`state_machine`] - Manual task lifecycle and two-person review
//! - [`messaging`] - Envelope classification, pgmq queues and outbound publishing
//! - [`events`] - In-process broadcast of committed lifecycle events
//! - [`config`] - YAML configuration with environment overrides
//! - [`database`] - Connection pool and migrations
//! - [`error`] - Error taxonomy and classification
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use casework_core::case::{InMemoryCaseRepository, SequenceRegistry};
//! use casework_core::config::OrchestrationConfig;
//! use casework_core::decision::{DecisionEngine, DisabledSampling};
//! use casework_core::messaging::InMemoryPublisher;
//! use casework_core::orchestration::Orchestrator;
//! use casework_core::store::InMemoryContextStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let repository = Arc::new(InMemoryCaseRepository::new());
//! let sequences = SequenceRegistry::case_workflows(
//!     repository,
//!     DecisionEngine::default(),
//!     Arc::new(DisabledSampling),
//! );
//! let orchestrator = Orchestrator::new(
//!     Arc::new(InMemoryContextStore::new(Duration::from_millis(500))),
//!     sequences,
//!     Arc::new(InMemoryPublisher::new()),
//!     OrchestrationConfig::default(),
//! );
//! # let _ = orchestrator;
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and in-memory integration tests
//! cargo test -- --ignored   # PostgreSQL-backed tests (needs DATABASE_URL)
//! ```

pub mod case;
pub mod config;
pub mod constants;
pub mod context;
pub mod database;
pub mod decision;
pub mod error;
pub mod events;
pub mod logging;
pub mod messaging;
pub mod orchestration;
pub mod state_machine;
pub mod store;

pub use config::{CaseworkConfig, ConfigManager, DatabaseConfig, OrchestrationConfig, PgmqConfig};
pub use context::{ContextSnapshot, ContextStatus, ExecutionContext, Request, SequenceKind};
pub use error::{CaseworkError, DomainError, ErrorClass, Result};
pub use orchestration::{
    Consumer, DomainEvent, DomainEventKind, Orchestrator, PassOutcome, Sequence, Step, StepOutcome,
};
pub use store::{ContextSession, ContextStore};
