use crate::constants::events;
use crate::context::{ContextSnapshot, Notification, Request};
use crate::orchestration::observer::ContextObserver;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

/// In-process broadcast of committed context lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub correlation_id: Uuid,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event with the given name and context
    pub fn publish(&self, event_name: impl Into<String>, correlation_id: Uuid, context: Value) {
        let event = PublishedEvent {
            name: event_name.into(),
            correlation_id,
            context,
            published_at: chrono::Utc::now(),
        };

        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Forwards every committed pass to an [`EventPublisher`]
pub struct EventPublisherObserver {
    publisher: EventPublisher,
}

impl EventPublisherObserver {
    pub fn new(publisher: EventPublisher) -> Self {
        Self { publisher }
    }
}

fn status_context(snapshot: &ContextSnapshot) -> Value {
    json!({
        "sequence": snapshot.sequence,
        "status": snapshot.status,
        "vedtaksperiode_id": snapshot.payload.vedtaksperiode_id(),
        "pending_requests": snapshot.pending_requests.len(),
    })
}

#[async_trait]
impl ContextObserver for EventPublisherObserver {
    fn name(&self) -> &str {
        "event_publisher"
    }

    async fn on_request(&self, correlation_id: Uuid, request: &Request) {
        self.publisher.publish(
            events::REQUEST_PUBLISHED,
            correlation_id,
            json!({ "request_type": request.kind() }),
        );
    }

    async fn on_notification(&self, correlation_id: Uuid, notification: &Notification) {
        self.publisher.publish(
            notification.name.clone(),
            correlation_id,
            notification.payload.clone(),
        );
    }

    async fn on_suspended(&self, snapshot: &ContextSnapshot) {
        self.publisher.publish(
            events::CONTEXT_SUSPENDED,
            snapshot.correlation_id,
            status_context(snapshot),
        );
    }

    async fn on_completion(&self, snapshot: &ContextSnapshot) {
        self.publisher.publish(
            events::CONTEXT_COMPLETED,
            snapshot.correlation_id,
            status_context(snapshot),
        );
    }

    async fn on_cancelled(&self, snapshot: &ContextSnapshot, reason: &str) {
        let mut context = status_context(snapshot);
        context["reason"] = json!(reason);
        self.publisher
            .publish(events::CONTEXT_ABORTED, snapshot.correlation_id, context);
    }

    async fn on_failure(&self, snapshot: &ContextSnapshot) {
        let mut context = status_context(snapshot);
        context["error_class"] = json!(snapshot.failure.as_ref().map(|f| f.class));
        self.publisher
            .publish(events::CONTEXT_FAILED, snapshot.correlation_id, context);
    }
}

/// Write every lifecycle event to the `casework::events` log target until
/// shutdown or until all publishers are gone. Returns the number logged.
pub async fn log_lifecycle_events(
    mut receiver: broadcast::Receiver<PublishedEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut logged = 0;
    loop {
        tokio::select! {
            biased;
            received = receiver.recv() => match received {
                Ok(event) => {
                    info!(
                        target: "casework::events",
                        event = %event.name,
                        correlation_id = %event.correlation_id,
                        context = %event.context,
                        "Lifecycle event"
                    );
                    logged += 1;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Lifecycle event log fell behind");
                }
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.changed() => break,
        }
    }
    logged
}
