use super::answers::{Answer, AnswerKind, AnswerPayload, AnswerRegistry};
use super::requests::Request;
use super::snapshot::{ContextSnapshot, ContextStatus, FailureRecord, SequenceKind};
use crate::case::domain::CasePayload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Side-effect notification raised by a step, delivered to observers only
/// after the pass that raised it has been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub name: String,
    pub payload: serde_json::Value,
}

/// Scratch space for one workflow instance during one orchestration pass.
///
/// A context rehydrated from a [`ContextSnapshot`] is indistinguishable, from
/// a sequence's point of view, from one that never left memory: steps only see
/// the payload, the answers and the requests registered in this pass.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    correlation_id: Uuid,
    sequence: SequenceKind,
    payload: CasePayload,
    answers: AnswerRegistry,
    /// Published in earlier passes and still unanswered
    pending: Vec<Request>,
    /// Registered during this pass, in registration order
    registered: Vec<Request>,
    outbox: Vec<Notification>,
    processed_message_ids: VecDeque<Uuid>,
    created_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new(correlation_id: Uuid, sequence: SequenceKind, payload: CasePayload) -> Self {
        Self {
            correlation_id,
            sequence,
            payload,
            answers: AnswerRegistry::new(),
            pending: Vec::new(),
            registered: Vec::new(),
            outbox: Vec::new(),
            processed_message_ids: VecDeque::new(),
            created_at: Utc::now(),
        }
    }

    /// Rebuild a context from its persisted snapshot, replaying collected answers.
    pub fn rehydrate(snapshot: ContextSnapshot) -> Self {
        Self {
            correlation_id: snapshot.correlation_id,
            sequence: snapshot.sequence,
            payload: snapshot.payload,
            answers: snapshot.answers,
            pending: snapshot.pending_requests,
            registered: Vec::new(),
            outbox: Vec::new(),
            processed_message_ids: snapshot.processed_message_ids,
            created_at: snapshot.created_at,
        }
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    pub fn sequence(&self) -> SequenceKind {
        self.sequence
    }

    pub fn payload(&self) -> &CasePayload {
        &self.payload
    }

    pub fn answers(&self) -> &AnswerRegistry {
        &self.answers
    }

    /// Typed answer lookup
    pub fn answer<T: AnswerPayload>(&self) -> Option<&T> {
        self.answers.get::<T>()
    }

    /// Add an answer. Pending requests of the same kind are considered satisfied.
    pub fn add_answer(&mut self, answer: Answer) {
        let kind = answer.kind();
        self.pending.retain(|request| request.kind() != kind);
        self.registered.retain(|request| request.kind() != kind);
        self.answers.insert(answer);
    }

    /// Register a need for external information. Idempotent within a pass.
    pub fn request(&mut self, request: Request) {
        if !self.registered.contains(&request) {
            self.registered.push(request);
        }
    }

    /// Requests registered during this pass
    pub fn registered_requests(&self) -> &[Request] {
        &self.registered
    }

    /// Requests published in earlier passes and still awaiting an answer
    pub fn pending_requests(&self) -> &[Request] {
        &self.pending
    }

    /// Requests registered this pass that have not been published before
    pub fn new_requests(&self) -> Vec<Request> {
        self.registered
            .iter()
            .filter(|request| !self.pending.contains(request))
            .cloned()
            .collect()
    }

    pub fn has_pending(&self, kind: AnswerKind) -> bool {
        self.pending.iter().any(|request| request.kind() == kind)
    }

    /// Queue a notification for observers
    pub fn notify(&mut self, name: impl Into<String>, payload: serde_json::Value) {
        self.outbox.push(Notification {
            name: name.into(),
            payload,
        });
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.outbox
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    pub fn has_processed(&self, message_id: Uuid) -> bool {
        self.processed_message_ids.contains(&message_id)
    }

    /// Build the snapshot to persist for `status`.
    ///
    /// Suspended contexts keep every still-unanswered request pending; terminal
    /// contexts carry no pending requests. A failed pass publishes nothing, so
    /// requests registered in it are not recorded as pending.
    pub fn to_snapshot(
        &self,
        status: ContextStatus,
        message_id: Uuid,
        history: usize,
        failure: Option<FailureRecord>,
    ) -> ContextSnapshot {
        let pending_requests = match status {
            ContextStatus::Suspended => {
                let mut pending = self.pending.clone();
                pending.extend(self.new_requests());
                pending
            }
            ContextStatus::New | ContextStatus::Failed => self.pending.clone(),
            ContextStatus::Done | ContextStatus::Aborted => Vec::new(),
        };

        let mut snapshot = ContextSnapshot {
            correlation_id: self.correlation_id,
            sequence: self.sequence,
            status,
            payload: self.payload.clone(),
            answers: self.answers.clone(),
            pending_requests,
            processed_message_ids: self.processed_message_ids.clone(),
            failure,
            created_at: self.created_at,
            updated_at: Utc::now(),
        };
        snapshot.record_message(message_id, history);
        snapshot
    }
}
