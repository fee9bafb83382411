//! # Outbound Publishing
//!
//! The seam through which the orchestrator emits requests and cancellation
//! notices. Publishing happens only after the pass that produced the message
//! has been committed.

use super::errors::{MessagingError, MessagingResult};
use super::message::{CancellationMessage, RequestMessage};
use super::pgmq_client::PgmqClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait OutboundPublisher: Send + Sync {
    async fn publish_request(&self, message: &RequestMessage) -> MessagingResult<()>;

    async fn publish_cancellation(&self, message: &CancellationMessage) -> MessagingResult<()>;
}

/// Publisher writing to the pgmq request and cancellation queues
pub struct PgmqPublisher {
    client: Arc<PgmqClient>,
    request_queue: String,
    cancellation_queue: String,
}

impl PgmqPublisher {
    pub fn new(
        client: Arc<PgmqClient>,
        request_queue: impl Into<String>,
        cancellation_queue: impl Into<String>,
    ) -> Self {
        Self {
            client,
            request_queue: request_queue.into(),
            cancellation_queue: cancellation_queue.into(),
        }
    }
}

#[async_trait]
impl OutboundPublisher for PgmqPublisher {
    async fn publish_request(&self, message: &RequestMessage) -> MessagingResult<()> {
        let msg_id = self
            .client
            .send_json_message(&self.request_queue, message)
            .await?;
        debug!(
            correlation_id = %message.correlation_id,
            request_type = %message.request_type,
            msg_id = msg_id,
            "Request published"
        );
        Ok(())
    }

    async fn publish_cancellation(&self, message: &CancellationMessage) -> MessagingResult<()> {
        self.client
            .send_json_message(&self.cancellation_queue, message)
            .await?;
        debug!(correlation_id = %message.correlation_id, "Cancellation published");
        Ok(())
    }
}

/// Publisher keeping everything in memory, for tests and local runs
#[derive(Default)]
pub struct InMemoryPublisher {
    requests: Mutex<Vec<RequestMessage>>,
    cancellations: Mutex<Vec<CancellationMessage>>,
    failing: AtomicBool,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<RequestMessage> {
        self.requests.lock().clone()
    }

    pub fn cancellations(&self) -> Vec<CancellationMessage> {
        self.cancellations.lock().clone()
    }

    fn check_available(&self) -> MessagingResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MessagingError::queue_operation(
                "in_memory",
                "send",
                "publisher unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl OutboundPublisher for InMemoryPublisher {
    async fn publish_request(&self, message: &RequestMessage) -> MessagingResult<()> {
        self.check_available()?;
        self.requests.lock().push(message.clone());
        Ok(())
    }

    async fn publish_cancellation(&self, message: &CancellationMessage) -> MessagingResult<()> {
        self.check_available()?;
        self.cancellations.lock().push(message.clone());
        Ok(())
    }
}
