//! # Lifecycle Events
//!
//! In-process broadcast of committed context lifecycle events and case
//! notifications, fed by an observer registered with the orchestrator.

pub mod publisher;

pub use publisher::{log_lifecycle_events, EventPublisher, EventPublisherObserver, PublishedEvent};
