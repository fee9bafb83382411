use serde::{Deserialize, Serialize};

/// Events that can trigger task state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskEvent {
    /// Hand the task to an automated downstream system
    SendToSystem,
    /// Submit for two-person review
    SendToSecondReviewer,
    /// Second reviewer sends the case back to the caseworker
    Return,
    /// Case handled
    Complete,
    /// Task no longer relevant
    Invalidate,
    /// Cancel a task that already left the caseworker
    Abort,
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SendToSystem => "send_to_system",
            Self::SendToSecondReviewer => "send_to_second_reviewer",
            Self::Return => "return",
            Self::Complete => "complete",
            Self::Invalidate => "invalidate",
            Self::Abort => "abort",
        }
    }

    /// Check if this event represents a terminal transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Invalidate | Self::Abort)
    }
}

/// Events that can trigger two-person review transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ReviewEvent {
    SubmitToReviewer { submitter: String, reviewer: String },
    Return { reviewer: String },
    Finalize { approver: String, payment_reference: String },
}

impl ReviewEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SubmitToReviewer { .. } => "submit_to_reviewer",
            Self::Return { .. } => "return",
            Self::Finalize { .. } => "finalize",
        }
    }

    /// The caseworker acting on the review
    pub fn actor(&self) -> &str {
        match self {
            Self::SubmitToReviewer { reviewer, .. } => reviewer,
            Self::Return { reviewer } => reviewer,
            Self::Finalize { approver, .. } => approver,
        }
    }
}
