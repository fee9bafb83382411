//! # Domain Events
//!
//! Typed form of an inbound message once it has been classified: which
//! context it belongs to and what the orchestration pass should do with it.

use crate::case::domain::CasePayload;
use crate::context::{Answer, SequenceKind};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    pub message_id: Uuid,
    pub correlation_id: Uuid,
    pub kind: DomainEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DomainEventKind {
    /// Originating event: creates the context, or resumes it on redelivery
    Start {
        sequence: SequenceKind,
        payload: CasePayload,
    },
    /// Answer to a request published by an earlier pass
    Answer(Answer),
    /// Superseding event: abort the context
    Cancel { reason: String },
}

impl DomainEvent {
    pub fn start(correlation_id: Uuid, sequence: SequenceKind, payload: CasePayload) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            correlation_id,
            kind: DomainEventKind::Start { sequence, payload },
        }
    }

    pub fn answer(correlation_id: Uuid, answer: Answer) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            correlation_id,
            kind: DomainEventKind::Answer(answer),
        }
    }

    pub fn cancel(correlation_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            correlation_id,
            kind: DomainEventKind::Cancel {
                reason: reason.into(),
            },
        }
    }

    /// Same event, different message id
    pub fn with_message_id(mut self, message_id: Uuid) -> Self {
        self.message_id = message_id;
        self
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self.kind {
            DomainEventKind::Start { .. } => "start",
            DomainEventKind::Answer(_) => "answer",
            DomainEventKind::Cancel { .. } => "cancel",
        }
    }
}
