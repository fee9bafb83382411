//! # Context Observers
//!
//! Listeners notified about a pass only after its context has been committed.
//! Observers cannot fail a pass: anything they do is best effort and their
//! errors are logged where they occur.

use crate::case::repository::CaseRepository;
use crate::context::{ContextSnapshot, Notification, Request};
use crate::logging::log_error;
use crate::state_machine::TaskStateMachine;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[async_trait]
pub trait ContextObserver: Send + Sync {
    fn name(&self) -> &str;

    /// A request was published
    async fn on_request(&self, _correlation_id: Uuid, _request: &Request) {}

    /// A step raised a notification during the committed pass
    async fn on_notification(&self, _correlation_id: Uuid, _notification: &Notification) {}

    /// The context is waiting for answers
    async fn on_suspended(&self, _snapshot: &ContextSnapshot) {}

    /// The context reached done
    async fn on_completion(&self, _snapshot: &ContextSnapshot) {}

    /// The context was aborted by a superseding event
    async fn on_cancelled(&self, _snapshot: &ContextSnapshot, _reason: &str) {}

    /// The context was marked failed
    async fn on_failure(&self, _snapshot: &ContextSnapshot) {}
}

/// Takes the open task of a cancelled case out of circulation
pub struct TaskInvalidationObserver {
    repository: Arc<dyn CaseRepository>,
}

impl TaskInvalidationObserver {
    pub fn new(repository: Arc<dyn CaseRepository>) -> Self {
        Self { repository }
    }

    async fn invalidate(&self, snapshot: &ContextSnapshot) -> crate::error::Result<()> {
        let vedtaksperiode_id = snapshot.payload.vedtaksperiode_id();
        let Some(task) = self.repository.open_task(vedtaksperiode_id).await? else {
            return Ok(());
        };

        let mut machine = TaskStateMachine::new(task);
        let Some(event) = machine.cancellation_event() else {
            return Ok(());
        };
        let state = machine.transition(event)?;
        self.repository.save_task(machine.task()).await?;

        info!(
            correlation_id = %snapshot.correlation_id,
            task_id = %machine.task_id(),
            state = %state,
            "Task taken out of circulation"
        );
        Ok(())
    }
}

#[async_trait]
impl ContextObserver for TaskInvalidationObserver {
    fn name(&self) -> &str {
        "task_invalidation"
    }

    async fn on_cancelled(&self, snapshot: &ContextSnapshot, _reason: &str) {
        if let Err(e) = self.invalidate(snapshot).await {
            log_error(
                "TaskInvalidationObserver",
                "on_cancelled",
                &e.to_string(),
                Some(&snapshot.correlation_id.to_string()),
            );
        }
    }
}
