//! # Inbound Queue
//!
//! Source of inbound envelopes for the consumer. A message read from the queue
//! stays invisible for the visibility timeout; it is acked after a pass has
//! been handled, archived when it can never succeed, and released for
//! redelivery on transient failure.

use super::errors::MessagingResult;
use super::pgmq_client::PgmqClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A message read from the inbound queue
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub msg_id: i64,
    /// Number of times the message has been read, including this one
    pub read_ct: i32,
    pub body: serde_json::Value,
}

#[async_trait]
pub trait InboundQueue: Send + Sync {
    async fn read_batch(&self, limit: i32) -> MessagingResult<Vec<InboundMessage>>;

    /// Remove a handled message
    async fn ack(&self, msg_id: i64) -> MessagingResult<()>;

    /// Park a message that can never succeed
    async fn archive(&self, msg_id: i64) -> MessagingResult<()>;

    /// Make a message available for redelivery
    async fn release(&self, msg_id: i64) -> MessagingResult<()>;
}

pub struct PgmqInboundQueue {
    client: Arc<PgmqClient>,
    queue_name: String,
    visibility_timeout_seconds: i32,
}

impl PgmqInboundQueue {
    pub fn new(
        client: Arc<PgmqClient>,
        queue_name: impl Into<String>,
        visibility_timeout_seconds: i32,
    ) -> Self {
        Self {
            client,
            queue_name: queue_name.into(),
            visibility_timeout_seconds,
        }
    }
}

#[async_trait]
impl InboundQueue for PgmqInboundQueue {
    async fn read_batch(&self, limit: i32) -> MessagingResult<Vec<InboundMessage>> {
        let messages = self
            .client
            .read_messages(
                &self.queue_name,
                Some(self.visibility_timeout_seconds),
                limit,
            )
            .await?;

        Ok(messages
            .into_iter()
            .map(|m| InboundMessage {
                msg_id: m.msg_id,
                read_ct: m.read_ct,
                body: m.message,
            })
            .collect())
    }

    async fn ack(&self, msg_id: i64) -> MessagingResult<()> {
        self.client.delete_message(&self.queue_name, msg_id).await
    }

    async fn archive(&self, msg_id: i64) -> MessagingResult<()> {
        self.client.archive_message(&self.queue_name, msg_id).await
    }

    /// pgmq redelivers once the visibility timeout expires
    async fn release(&self, _msg_id: i64) -> MessagingResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryQueueState {
    ready: VecDeque<InboundMessage>,
    in_flight: BTreeMap<i64, InboundMessage>,
    acked: Vec<i64>,
    archived: Vec<InboundMessage>,
}

/// Queue keeping everything in memory, for tests and local runs
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    next_id: AtomicI64,
    state: Mutex<InMemoryQueueState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, body: serde_json::Value) -> i64 {
        let msg_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.lock().ready.push_back(InboundMessage {
            msg_id,
            read_ct: 0,
            body,
        });
        msg_id
    }

    pub fn ready_len(&self) -> usize {
        self.state.lock().ready.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    pub fn acked(&self) -> Vec<i64> {
        self.state.lock().acked.clone()
    }

    pub fn archived(&self) -> Vec<InboundMessage> {
        self.state.lock().archived.clone()
    }
}

#[async_trait]
impl InboundQueue for InMemoryQueue {
    async fn read_batch(&self, limit: i32) -> MessagingResult<Vec<InboundMessage>> {
        let mut state = self.state.lock();
        let take = usize::try_from(limit).unwrap_or(0).min(state.ready.len());
        let mut batch = Vec::with_capacity(take);
        for mut message in state.ready.drain(..take).collect::<Vec<_>>() {
            message.read_ct += 1;
            state.in_flight.insert(message.msg_id, message.clone());
            batch.push(message);
        }
        Ok(batch)
    }

    async fn ack(&self, msg_id: i64) -> MessagingResult<()> {
        let mut state = self.state.lock();
        if state.in_flight.remove(&msg_id).is_some() {
            state.acked.push(msg_id);
        }
        Ok(())
    }

    async fn archive(&self, msg_id: i64) -> MessagingResult<()> {
        let mut state = self.state.lock();
        if let Some(message) = state.in_flight.remove(&msg_id) {
            state.archived.push(message);
        }
        Ok(())
    }

    async fn release(&self, msg_id: i64) -> MessagingResult<()> {
        let mut state = self.state.lock();
        if let Some(message) = state.in_flight.remove(&msg_id) {
            state.ready.push_back(message);
        }
        Ok(())
    }
}
