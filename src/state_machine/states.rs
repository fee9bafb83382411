use serde::{Deserialize, Serialize};
use std::fmt;

/// Task (oppgave) state definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Initial state: a caseworker must handle the case
    AwaitingCaseworker,
    /// Handed over to an automated downstream system
    AwaitingSystem,
    /// Submitted for two-person review
    AwaitingSecondReviewer,
    /// Case handled
    Completed,
    /// Made obsolete before anyone handled it
    Invalidated,
    /// Cancelled after leaving the caseworker
    Aborted,
}

impl TaskState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Invalidated | Self::Aborted)
    }

    /// Open tasks still need work from someone
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingCaseworker => write!(f, "awaiting_caseworker"),
            Self::AwaitingSystem => write!(f, "awaiting_system"),
            Self::AwaitingSecondReviewer => write!(f, "awaiting_second_reviewer"),
            Self::Completed => write!(f, "completed"),
            Self::Invalidated => write!(f, "invalidated"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_caseworker" => Ok(Self::AwaitingCaseworker),
            "awaiting_system" => Ok(Self::AwaitingSystem),
            "awaiting_second_reviewer" => Ok(Self::AwaitingSecondReviewer),
            "completed" => Ok(Self::Completed),
            "invalidated" => Ok(Self::Invalidated),
            "aborted" => Ok(Self::Aborted),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

/// Two-person review (totrinnsvurdering) state definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    /// Created, the first caseworker has not submitted yet
    AwaitingReview,
    /// Submitted, waiting for a second caseworker to approve or return
    AwaitingSecondReviewer,
    /// Sent back to the submitting caseworker
    Returned,
    /// Approved by the second caseworker
    Finalized,
}

impl ReviewState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized)
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingReview => write!(f, "awaiting_review"),
            Self::AwaitingSecondReviewer => write!(f, "awaiting_second_reviewer"),
            Self::Returned => write!(f, "returned"),
            Self::Finalized => write!(f, "finalized"),
        }
    }
}

impl std::str::FromStr for ReviewState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "awaiting_review" => Ok(Self::AwaitingReview),
            "awaiting_second_reviewer" => Ok(Self::AwaitingSecondReviewer),
            "returned" => Ok(Self::Returned),
            "finalized" => Ok(Self::Finalized),
            _ => Err(format!("Invalid review state: {s}")),
        }
    }
}

/// Default state for new tasks
impl Default for TaskState {
    fn default() -> Self {
        Self::AwaitingCaseworker
    }
}

/// Default state for new reviews
impl Default for ReviewState {
    fn default() -> Self {
        Self::AwaitingReview
    }
}
