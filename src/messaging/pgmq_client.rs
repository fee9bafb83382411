//! # PostgreSQL Message Queue Client (pgmq-rs)
//!
//! Thin wrapper over the pgmq-rs crate used by the inbound queue and the
//! outbound publisher.

use super::errors::{MessagingError, MessagingResult};
use pgmq::{types::Message, PGMQueue};
use tracing::{debug, info, warn};

/// pgmq-rs based message queue client
#[derive(Debug, Clone)]
pub struct PgmqClient {
    pgmq: PGMQueue,
}

impl PgmqClient {
    /// Create new pgmq client using connection string
    pub async fn new(database_url: &str) -> MessagingResult<Self> {
        info!("Connecting to pgmq");

        let pgmq = PGMQueue::new(database_url.to_string())
            .await
            .map_err(|e| MessagingError::connection(e.to_string()))?;

        info!("Connected to pgmq");
        Ok(Self { pgmq })
    }

    /// Create new pgmq client using existing connection pool
    pub async fn new_with_pool(pool: sqlx::PgPool) -> Self {
        debug!("Creating pgmq client with shared connection pool");
        let pgmq = PGMQueue::new_with_pool(pool).await;
        Self { pgmq }
    }

    /// Create queue if it doesn't exist
    pub async fn create_queue(&self, queue_name: &str) -> MessagingResult<()> {
        debug!(queue = %queue_name, "Creating queue");

        self.pgmq
            .create(queue_name)
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "create", e.to_string()))?;

        info!(queue = %queue_name, "Queue ready");
        Ok(())
    }

    /// Create every queue in `queue_names`
    pub async fn initialize_queues(&self, queue_names: &[&str]) -> MessagingResult<()> {
        for queue_name in queue_names {
            self.create_queue(queue_name).await?;
        }
        Ok(())
    }

    /// Send a JSON-serializable message to a queue
    pub async fn send_json_message<T: serde::Serialize>(
        &self,
        queue_name: &str,
        message: &T,
    ) -> MessagingResult<i64> {
        let serialized = serde_json::to_value(message)?;
        let message_id = self
            .pgmq
            .send(queue_name, &serialized)
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "send", e.to_string()))?;

        debug!(queue = %queue_name, msg_id = message_id, "Message sent");
        Ok(message_id)
    }

    /// Read a batch of messages, hiding them for `vt` seconds
    pub async fn read_messages(
        &self,
        queue_name: &str,
        vt: Option<i32>,
        limit: i32,
    ) -> MessagingResult<Vec<Message<serde_json::Value>>> {
        let messages = self
            .pgmq
            .read_batch(queue_name, vt, limit)
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "read_batch", e.to_string()))?
            .unwrap_or_default();

        debug!(
            queue = %queue_name,
            count = messages.len(),
            "Read messages"
        );
        Ok(messages)
    }

    /// Delete message from queue
    pub async fn delete_message(&self, queue_name: &str, message_id: i64) -> MessagingResult<()> {
        self.pgmq
            .delete(queue_name, message_id)
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "delete", e.to_string()))?;

        debug!(queue = %queue_name, msg_id = message_id, "Message deleted");
        Ok(())
    }

    /// Archive message (move to archive)
    pub async fn archive_message(&self, queue_name: &str, message_id: i64) -> MessagingResult<()> {
        self.pgmq
            .archive(queue_name, message_id)
            .await
            .map_err(|e| MessagingError::queue_operation(queue_name, "archive", e.to_string()))?;

        warn!(queue = %queue_name, msg_id = message_id, "Message archived");
        Ok(())
    }
}
