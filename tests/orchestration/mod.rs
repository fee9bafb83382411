//! Orchestration Integration Tests
//!
//! Suspend/resume semantics, the case workflows end to end, cancellation,
//! failure handling, context serialization and the inbound consumer.

pub mod approval_workflow_test;
pub mod concurrency_test;
pub mod consumer_test;
pub mod failure_test;
pub mod housekeeping_test;
pub mod sequence_resume_test;
