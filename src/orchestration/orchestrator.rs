//! # Orchestrator
//!
//! Drives one orchestration pass per domain event:
//!
//! 1. Lock the context row for the correlation id (retrying contention)
//! 2. Rehydrate the context, or create it for an originating event
//! 3. Insert an incoming answer, then run the sequence in execute or resume mode
//! 4. Persist the outcome and commit
//! 5. Publish newly registered requests and notify observers, only after commit
//!
//! The orchestrator alone decides between persisting and propagating a
//! failure: steps never swallow errors.

use super::event::{DomainEvent, DomainEventKind};
use super::observer::ContextObserver;
use super::step::{RunMode, StepOutcome};
use crate::case::sequences::SequenceRegistry;
use crate::config::OrchestrationConfig;
use crate::context::{ContextSnapshot, ContextStatus, ExecutionContext, FailureRecord, Request};
use crate::error::{CaseworkError, ErrorClass, Result};
use crate::logging::{audit_failure, log_context_operation, log_error};
use crate::messaging::{CancellationMessage, OutboundPublisher, RequestMessage};
use crate::store::{ContextSession, ContextStore, StoreError};
use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// What a pass did with its event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The sequence ran to the end
    Completed,
    /// The sequence is waiting for answers; `published` requests went out in this pass
    Suspended { published: usize },
    /// The context was cancelled
    Aborted,
    /// The message id was already processed for this context
    Duplicate,
    /// The context is terminal and accepts no further events
    IgnoredTerminal { status: ContextStatus },
    /// A cancellation arrived for a context that was never created
    IgnoredUnknown,
}

impl PassOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Suspended { .. } => "suspended",
            Self::Aborted => "aborted",
            Self::Duplicate => "duplicate",
            Self::IgnoredTerminal { .. } => "ignored_terminal",
            Self::IgnoredUnknown => "ignored_unknown",
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn ContextStore>,
    sequences: Arc<SequenceRegistry>,
    publisher: Arc<dyn OutboundPublisher>,
    observers: RwLock<Vec<Arc<dyn ContextObserver>>>,
    config: OrchestrationConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ContextStore>,
        sequences: SequenceRegistry,
        publisher: Arc<dyn OutboundPublisher>,
        config: OrchestrationConfig,
    ) -> Self {
        Self {
            store,
            sequences: Arc::new(sequences),
            publisher,
            observers: RwLock::new(Vec::new()),
            config,
        }
    }

    pub fn register_observer(&self, observer: Arc<dyn ContextObserver>) {
        debug!(observer = observer.name(), "Observer registered");
        self.observers.write().push(observer);
    }

    pub fn store(&self) -> &Arc<dyn ContextStore> {
        &self.store
    }

    pub fn publisher(&self) -> &Arc<dyn OutboundPublisher> {
        &self.publisher
    }

    fn observers(&self) -> Vec<Arc<dyn ContextObserver>> {
        self.observers.read().clone()
    }

    /// Run one pass for `event`
    #[instrument(
        skip(self, event),
        fields(
            correlation_id = %event.correlation_id,
            message_id = %event.message_id,
            event = event.label()
        )
    )]
    pub async fn handle(&self, event: DomainEvent) -> Result<PassOutcome> {
        let correlation_id = event.correlation_id;
        let message_id = event.message_id;
        let session = self.open_session(correlation_id).await?;
        let existing = session.current().cloned();

        if let Some(snapshot) = &existing {
            if snapshot.has_processed(message_id) {
                debug!("Message already processed for this context");
                return Ok(PassOutcome::Duplicate);
            }
            if snapshot.status.is_terminal() {
                log_context_operation(
                    "ignore",
                    correlation_id,
                    Some(&snapshot.sequence.to_string()),
                    &snapshot.status.to_string(),
                    Some(event.label()),
                );
                return Ok(PassOutcome::IgnoredTerminal {
                    status: snapshot.status,
                });
            }
        }

        let (ctx, mode) = match (event.kind, existing) {
            (DomainEventKind::Cancel { reason }, Some(snapshot)) => {
                return self.abort(session, snapshot, &reason, message_id).await;
            }
            (DomainEventKind::Cancel { .. }, None) => {
                debug!("Cancellation for unknown context");
                return Ok(PassOutcome::IgnoredUnknown);
            }
            (DomainEventKind::Start { sequence, payload }, None) => (
                ExecutionContext::new(correlation_id, sequence, payload),
                RunMode::Execute,
            ),
            (DomainEventKind::Start { .. }, Some(snapshot)) => {
                (ExecutionContext::rehydrate(snapshot), RunMode::Resume)
            }
            (DomainEventKind::Answer(answer), Some(snapshot)) => {
                let expected = snapshot.payload.vedtaksperiode_id();
                if let Some(answered) = answer.vedtaksperiode_id() {
                    if answered != expected {
                        return Err(CaseworkError::ValidationError(format!(
                            "Answer {} is for vedtaksperiode {answered}, context {correlation_id} handles {expected}",
                            answer.kind()
                        )));
                    }
                }
                let mut ctx = ExecutionContext::rehydrate(snapshot);
                debug!(answer = %answer.kind(), "Answer added to context");
                ctx.add_answer(answer);
                (ctx, RunMode::Resume)
            }
            (DomainEventKind::Answer(answer), None) => {
                return Err(CaseworkError::ValidationError(format!(
                    "Answer {} for unknown context {correlation_id}",
                    answer.kind()
                )));
            }
        };

        self.drive(session, ctx, mode, message_id).await
    }

    /// Re-run a failed context from its first incomplete step.
    ///
    /// Failures are never retried automatically; this is the operator's way
    /// to unpark one once the cause has been dealt with.
    #[instrument(skip(self))]
    pub async fn replay(&self, correlation_id: Uuid) -> Result<PassOutcome> {
        let session = self.open_session(correlation_id).await?;
        let snapshot = session.current().cloned().ok_or_else(|| {
            CaseworkError::ValidationError(format!("No context {correlation_id} to replay"))
        })?;

        if snapshot.status != ContextStatus::Failed {
            return Err(CaseworkError::ValidationError(format!(
                "Context {correlation_id} is {} and cannot be replayed",
                snapshot.status
            )));
        }

        info!(sequence = %snapshot.sequence, "Replaying failed context");
        let ctx = ExecutionContext::rehydrate(snapshot);
        self.drive(session, ctx, RunMode::Resume, Uuid::now_v7())
            .await
    }

    /// Lock the context, retrying while another pass holds it
    async fn open_session(&self, correlation_id: Uuid) -> Result<Box<dyn ContextSession>> {
        let attempts = self.config.lock_retry_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.store.open(correlation_id).await {
                Ok(session) => return Ok(session),
                Err(StoreError::LockConflict { .. }) if attempt < attempts => {
                    let backoff = self.config.lock_retry_backoff(attempt);
                    warn!(
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Context locked by another pass, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Run the sequence and persist whatever it produced
    async fn drive(
        &self,
        mut session: Box<dyn ContextSession>,
        mut ctx: ExecutionContext,
        mode: RunMode,
        message_id: Uuid,
    ) -> Result<PassOutcome> {
        let correlation_id = ctx.correlation_id();
        let sequence_name = ctx.sequence().to_string();
        let sequence = self.sequences.get(ctx.sequence()).ok_or_else(|| {
            CaseworkError::ConfigurationError(format!("No sequence registered for {sequence_name}"))
        })?;
        let history = self.config.processed_message_history;

        match sequence.run(&mut ctx, mode).await {
            Ok(StepOutcome::Done) => {
                let snapshot = ctx.to_snapshot(ContextStatus::Done, message_id, history, None);
                session.save(&snapshot).await?;
                session.commit().await?;

                log_context_operation("pass", correlation_id, Some(&sequence_name), "done", None);
                self.notify_committed(&mut ctx).await;
                let observers = self.observers();
                join_all(observers.iter().map(|o| o.on_completion(&snapshot))).await;
                Ok(PassOutcome::Completed)
            }
            Ok(StepOutcome::Suspended) => {
                let new_requests = ctx.new_requests();
                let snapshot =
                    ctx.to_snapshot(ContextStatus::Suspended, message_id, history, None);
                session.save(&snapshot).await?;
                session.commit().await?;

                let published = self.publish_requests(correlation_id, &new_requests).await;
                log_context_operation(
                    "pass",
                    correlation_id,
                    Some(&sequence_name),
                    "suspended",
                    Some(&format!(
                        "published {published} of {} new requests, {} pending",
                        new_requests.len(),
                        snapshot.pending_requests.len()
                    )),
                );
                self.notify_committed(&mut ctx).await;
                let observers = self.observers();
                join_all(observers.iter().map(|o| o.on_suspended(&snapshot))).await;
                Ok(PassOutcome::Suspended { published })
            }
            Err(error) if error.classify() == ErrorClass::Transient => {
                // Nothing is written: the context stays as it was and the
                // message is redelivered
                warn!(error = %error, "Transient failure, pass rolled back");
                Err(error)
            }
            Err(error) => {
                self.park(session, &ctx, &sequence_name, message_id, &error)
                    .await?;
                Err(error)
            }
        }
    }

    /// Mark the context failed and write the full diagnostics to the audit channel
    async fn park(
        &self,
        mut session: Box<dyn ContextSession>,
        ctx: &ExecutionContext,
        sequence_name: &str,
        message_id: Uuid,
        error: &CaseworkError,
    ) -> Result<()> {
        let failure = FailureRecord {
            class: error.classify(),
            message: error.to_string(),
            message_id,
            failed_at: Utc::now(),
        };
        let snapshot = ctx.to_snapshot(
            ContextStatus::Failed,
            message_id,
            self.config.processed_message_history,
            Some(failure),
        );
        session.save(&snapshot).await?;
        session.commit().await?;

        log_context_operation(
            "pass",
            ctx.correlation_id(),
            Some(sequence_name),
            "failed",
            Some(&error.classify().to_string()),
        );
        audit_failure(
            ctx.correlation_id(),
            message_id,
            &error.to_string(),
            &json!({
                "sequence": sequence_name,
                "registered_requests": ctx.registered_requests(),
                "context": &snapshot,
            }),
        );

        let observers = self.observers();
        join_all(observers.iter().map(|o| o.on_failure(&snapshot))).await;
        Ok(())
    }

    async fn abort(
        &self,
        mut session: Box<dyn ContextSession>,
        snapshot: ContextSnapshot,
        reason: &str,
        message_id: Uuid,
    ) -> Result<PassOutcome> {
        let correlation_id = snapshot.correlation_id;
        let withdrawn = snapshot.pending_requests.clone();
        let aborted = ExecutionContext::rehydrate(snapshot).to_snapshot(
            ContextStatus::Aborted,
            message_id,
            self.config.processed_message_history,
            None,
        );
        session.save(&aborted).await?;
        session.commit().await?;

        let message = CancellationMessage::new(correlation_id, reason, &withdrawn);
        if let Err(e) = self.publisher.publish_cancellation(&message).await {
            log_error(
                "Orchestrator",
                "publish_cancellation",
                &e.to_string(),
                Some(&correlation_id.to_string()),
            );
        }

        log_context_operation(
            "pass",
            correlation_id,
            Some(&aborted.sequence.to_string()),
            "aborted",
            Some(reason),
        );
        let observers = self.observers();
        join_all(observers.iter().map(|o| o.on_cancelled(&aborted, reason))).await;
        Ok(PassOutcome::Aborted)
    }

    /// Publish requests of a committed pass. A request that fails to publish
    /// is still recorded as pending and goes out again with housekeeping.
    async fn publish_requests(&self, correlation_id: Uuid, requests: &[Request]) -> usize {
        let observers = self.observers();
        let mut published = 0;

        for request in requests {
            let message = RequestMessage::from_request(correlation_id, request);
            match self.publisher.publish_request(&message).await {
                Ok(()) => {
                    published += 1;
                    for observer in &observers {
                        observer.on_request(correlation_id, request).await;
                    }
                }
                Err(e) => log_error(
                    "Orchestrator",
                    "publish_request",
                    &e.to_string(),
                    Some(&format!("{correlation_id} {}", request.kind())),
                ),
            }
        }

        published
    }

    async fn notify_committed(&self, ctx: &mut ExecutionContext) {
        let notifications = ctx.take_notifications();
        if notifications.is_empty() {
            return;
        }

        let correlation_id = ctx.correlation_id();
        for observer in self.observers() {
            for notification in &notifications {
                observer.on_notification(correlation_id, notification).await;
            }
        }
    }
}
