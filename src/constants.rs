//! # System Constants
//!
//! Queue names, wire tags and observer event names shared across the engine.

/// Default pgmq queue names
pub mod queues {
    pub const INBOUND: &str = "casework_inbound";
    pub const REQUESTS: &str = "casework_requests";
    pub const CANCELLATIONS: &str = "casework_cancellations";
}

/// Inbound envelope event-type discriminators
pub mod event_types {
    pub const APPROVAL_NEEDED: &str = "approval_needed";
    pub const DECISION_MADE: &str = "decision_made";
    pub const ANSWER: &str = "answer";
    pub const CASE_CANCELLED: &str = "case_cancelled";
}

/// Notifications emitted to observers after a committed pass
pub mod events {
    pub const CONTEXT_SUSPENDED: &str = "context.suspended";
    pub const CONTEXT_COMPLETED: &str = "context.completed";
    pub const CONTEXT_ABORTED: &str = "context.aborted";
    pub const CONTEXT_FAILED: &str = "context.failed";
    pub const REQUEST_PUBLISHED: &str = "request.published";
    pub const CASE_AUTO_APPROVED: &str = "case.auto_approved";
    pub const CASE_ROUTED_TO_MANUAL: &str = "case.routed_to_manual";
    pub const CASE_FINALIZED: &str = "case.finalized";
}

/// Bounded history kept for duplicate message detection
pub const DEFAULT_PROCESSED_MESSAGE_HISTORY: usize = 64;
