//! # Envelope Classification
//!
//! Turns an inbound [`Envelope`] into a typed [`DomainEvent`]. Schema checks
//! happen upstream; this only decides routing and decodes the payload, and
//! rejects what cannot be routed before any context exists.

use super::errors::{MessagingError, MessagingResult};
use super::message::Envelope;
use crate::case::domain::CasePayload;
use crate::constants::event_types;
use crate::context::{Answer, AnswerKind, SequenceKind};
use crate::orchestration::event::{DomainEvent, DomainEventKind};
use serde::Deserialize;

#[derive(Debug, Default, Clone, Copy)]
pub struct Classifier;

#[derive(Debug, Deserialize)]
struct CancellationPayload {
    #[serde(default)]
    reason: Option<String>,
}

impl Classifier {
    pub fn new() -> Self {
        Self
    }

    /// Decode a raw queue payload and classify it
    pub fn classify_value(&self, raw: serde_json::Value) -> MessagingResult<DomainEvent> {
        let envelope: Envelope = serde_json::from_value(raw)
            .map_err(|e| MessagingError::validation(format!("malformed envelope: {e}")))?;
        self.classify(&envelope)
    }

    pub fn classify(&self, envelope: &Envelope) -> MessagingResult<DomainEvent> {
        if envelope.correlation_id.is_nil() {
            return Err(MessagingError::validation("missing correlation id"));
        }
        if envelope.message_id.is_nil() {
            return Err(MessagingError::validation("missing message id"));
        }

        let kind = match envelope.event_type.as_str() {
            event_types::APPROVAL_NEEDED => DomainEventKind::Start {
                sequence: SequenceKind::Approval,
                payload: CasePayload::Approval(decode(envelope)?),
            },
            event_types::DECISION_MADE => DomainEventKind::Start {
                sequence: SequenceKind::Finalization,
                payload: CasePayload::Finalization(decode(envelope)?),
            },
            event_types::ANSWER => DomainEventKind::Answer(decode_answer(envelope)?),
            event_types::CASE_CANCELLED => {
                let payload: CancellationPayload = decode(envelope)?;
                DomainEventKind::Cancel {
                    reason: payload
                        .reason
                        .unwrap_or_else(|| event_types::CASE_CANCELLED.to_string()),
                }
            }
            other => {
                return Err(MessagingError::validation(format!(
                    "unknown event type '{other}'"
                )))
            }
        };

        Ok(DomainEvent {
            message_id: envelope.message_id,
            correlation_id: envelope.correlation_id,
            kind,
        })
    }
}

fn decode<T: serde::de::DeserializeOwned>(envelope: &Envelope) -> MessagingResult<T> {
    serde_json::from_value(envelope.payload.clone()).map_err(|e| {
        MessagingError::validation(format!(
            "invalid {} payload: {e}",
            envelope.event_type
        ))
    })
}

fn decode_answer(envelope: &Envelope) -> MessagingResult<Answer> {
    let tag = envelope
        .answer_type
        .as_deref()
        .ok_or_else(|| MessagingError::validation("answer without answer_type"))?;
    let kind: AnswerKind = tag.parse().map_err(MessagingError::validation)?;

    Answer::from_tagged(kind, envelope.payload.clone())
        .map_err(|e| MessagingError::validation(format!("invalid {kind} answer: {e}")))
}
