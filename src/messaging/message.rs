//! # Message Structures for pgmq Queues
//!
//! Wire formats at the message bus boundary: the inbound [`Envelope`] and the
//! outbound request and cancellation messages.

use crate::context::{AnswerKind, Request};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event-type discriminator, see [`crate::constants::event_types`]
    pub event_type: String,
    /// Globally unique id of this message
    pub message_id: Uuid,
    pub correlation_id: Uuid,
    /// Answer type tag, present only on answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_type: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Envelope {
    pub fn new(event_type: impl Into<String>, correlation_id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            message_id: Uuid::now_v7(),
            correlation_id,
            answer_type: None,
            payload,
        }
    }

    /// Build an answer envelope for `kind`
    pub fn answer(correlation_id: Uuid, kind: AnswerKind, payload: serde_json::Value) -> Self {
        Self {
            answer_type: Some(kind.to_string()),
            ..Self::new(crate::constants::event_types::ANSWER, correlation_id, payload)
        }
    }
}

/// Outbound request (behov) published on suspension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub message_id: Uuid,
    pub correlation_id: Uuid,
    pub request_type: AnswerKind,
    pub parameters: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl RequestMessage {
    pub fn from_request(correlation_id: Uuid, request: &Request) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            correlation_id,
            request_type: request.kind(),
            parameters: request.parameters(),
            created_at: Utc::now(),
        }
    }
}

/// Outbound notice that a context was aborted and its requests withdrawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancellationMessage {
    pub message_id: Uuid,
    pub correlation_id: Uuid,
    pub reason: String,
    /// Kinds of requests still outstanding when the context was aborted
    pub withdrawn_requests: Vec<AnswerKind>,
    pub created_at: DateTime<Utc>,
}

impl CancellationMessage {
    pub fn new(correlation_id: Uuid, reason: impl Into<String>, withdrawn: &[Request]) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            correlation_id,
            reason: reason.into(),
            withdrawn_requests: withdrawn.iter().map(Request::kind).collect(),
            created_at: Utc::now(),
        }
    }
}
