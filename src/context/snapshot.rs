//! # Context Snapshot
//!
//! The persisted form of an execution context: one row per correlation id.

use super::answers::AnswerRegistry;
use super::requests::Request;
use crate::case::domain::CasePayload;
use crate::error::ErrorClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of an execution context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    New,
    Suspended,
    Done,
    Aborted,
    Failed,
}

impl ContextStatus {
    /// Terminal contexts are immutable
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Aborted | Self::Failed)
    }
}

impl fmt::Display for ContextStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Suspended => write!(f, "suspended"),
            Self::Done => write!(f, "done"),
            Self::Aborted => write!(f, "aborted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ContextStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "suspended" => Ok(Self::Suspended),
            "done" => Ok(Self::Done),
            "aborted" => Ok(Self::Aborted),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid context status: {s}")),
        }
    }
}

impl Default for ContextStatus {
    fn default() -> Self {
        Self::New
    }
}

/// Which fixed sequence drives a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceKind {
    Approval,
    Finalization,
}

impl fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approval => write!(f, "approval"),
            Self::Finalization => write!(f, "finalization"),
        }
    }
}

impl std::str::FromStr for SequenceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approval" => Ok(Self::Approval),
            "finalization" => Ok(Self::Finalization),
            _ => Err(format!("Invalid sequence kind: {s}")),
        }
    }
}

/// Why a context was marked failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub class: ErrorClass,
    pub message: String,
    pub message_id: Uuid,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub correlation_id: Uuid,
    pub sequence: SequenceKind,
    pub status: ContextStatus,
    pub payload: CasePayload,
    pub answers: AnswerRegistry,
    /// Requests published and not yet answered
    pub pending_requests: Vec<Request>,
    /// Most recent inbound message ids, oldest first
    pub processed_message_ids: VecDeque<Uuid>,
    pub failure: Option<FailureRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContextSnapshot {
    pub fn has_processed(&self, message_id: Uuid) -> bool {
        self.processed_message_ids.contains(&message_id)
    }

    /// Remember a message id, evicting the oldest beyond `history`.
    pub fn record_message(&mut self, message_id: Uuid, history: usize) {
        if self.has_processed(message_id) {
            return;
        }
        self.processed_message_ids.push_back(message_id);
        while self.processed_message_ids.len() > history.max(1) {
            self.processed_message_ids.pop_front();
        }
    }
}
