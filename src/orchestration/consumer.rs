//! # Inbound Consumer
//!
//! Reads batches from the inbound queue and hands each message to its own
//! worker, bounded by a semaphore sized to the worker pool. Two messages for
//! the same correlation id may run concurrently here; the context lock in the
//! store serializes them.

use super::orchestrator::{Orchestrator, PassOutcome};
use crate::config::{OrchestrationConfig, PgmqConfig};
use crate::error::{CaseworkError, ErrorClass, Result};
use crate::messaging::{Classifier, InboundMessage, InboundQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// What happens to a message after its pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Handled, delete it
    Ack,
    /// Can never succeed, park it in the archive
    Archive,
    /// Leave it for redelivery
    Retry,
}

impl Disposition {
    pub fn for_result(result: &Result<PassOutcome>) -> Self {
        match result {
            Ok(_) => Self::Ack,
            Err(e) => Self::for_error(e),
        }
    }

    pub fn for_error(error: &CaseworkError) -> Self {
        match error.classify() {
            // The failure is recorded on the context; redelivery cannot change it
            ErrorClass::DomainRule => Self::Ack,
            ErrorClass::Transient => Self::Retry,
            ErrorClass::Validation | ErrorClass::Fatal => Self::Archive,
        }
    }
}

/// Counts for one or more batches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub messages: usize,
    pub acked: usize,
    pub archived: usize,
    pub retried: usize,
}

impl BatchSummary {
    fn record(&mut self, disposition: Disposition) {
        self.messages += 1;
        match disposition {
            Disposition::Ack => self.acked += 1,
            Disposition::Archive => self.archived += 1,
            Disposition::Retry => self.retried += 1,
        }
    }

    fn absorb(&mut self, other: BatchSummary) {
        self.messages += other.messages;
        self.acked += other.acked;
        self.archived += other.archived;
        self.retried += other.retried;
    }
}

#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub batch_size: i32,
    pub poll_interval: Duration,
    pub worker_pool_size: usize,
}

impl ConsumerConfig {
    pub fn from_config(pgmq: &PgmqConfig, orchestration: &OrchestrationConfig) -> Self {
        Self {
            batch_size: pgmq.batch_size,
            poll_interval: pgmq.poll_interval(),
            worker_pool_size: orchestration.worker_pool_size,
        }
    }
}

pub struct Consumer {
    queue: Arc<dyn InboundQueue>,
    orchestrator: Arc<Orchestrator>,
    classifier: Classifier,
    workers: Arc<Semaphore>,
    config: ConsumerConfig,
}

impl Consumer {
    pub fn new(
        queue: Arc<dyn InboundQueue>,
        orchestrator: Arc<Orchestrator>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            classifier: Classifier::new(),
            workers: Arc::new(Semaphore::new(config.worker_pool_size.max(1))),
            config,
        }
    }

    /// Poll until `shutdown` flips to true. The batch in flight is finished first.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<BatchSummary> {
        info!(
            batch_size = self.config.batch_size,
            worker_pool_size = self.config.worker_pool_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting inbound consumer"
        );

        let mut total = BatchSummary::default();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.run_batch().await {
                Ok(summary) => {
                    total.absorb(summary);
                    summary.messages == 0
                }
                Err(e) => {
                    error!(error = %e, "Error in inbound batch");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(
            messages = total.messages,
            acked = total.acked,
            archived = total.archived,
            retried = total.retried,
            "Inbound consumer stopped"
        );
        Ok(total)
    }

    /// Read one batch and process it on the worker pool
    pub async fn run_batch(&self) -> Result<BatchSummary> {
        let messages = self.queue.read_batch(self.config.batch_size).await?;
        let mut summary = BatchSummary::default();
        if messages.is_empty() {
            return Ok(summary);
        }

        debug!(message_count = messages.len(), "Processing inbound batch");

        let mut workers = JoinSet::new();
        for message in messages {
            let permit = self
                .workers
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| CaseworkError::Internal(format!("Worker pool closed: {e}")))?;
            let queue = self.queue.clone();
            let orchestrator = self.orchestrator.clone();
            let classifier = self.classifier;

            workers.spawn(async move {
                let disposition =
                    process_message(queue.as_ref(), &orchestrator, classifier, message).await;
                drop(permit);
                disposition
            });
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(disposition) => summary.record(disposition),
                Err(e) => {
                    // The message stays invisible until its timeout and is redelivered
                    error!(error = %e, "Inbound worker panicked");
                    summary.record(Disposition::Retry);
                }
            }
        }

        Ok(summary)
    }
}

async fn process_message(
    queue: &dyn InboundQueue,
    orchestrator: &Orchestrator,
    classifier: Classifier,
    message: InboundMessage,
) -> Disposition {
    let msg_id = message.msg_id;

    let disposition = match classifier.classify_value(message.body) {
        Ok(event) => {
            let result = orchestrator.handle(event).await;
            match &result {
                Ok(outcome) => debug!(msg_id = msg_id, outcome = outcome.label(), "Message handled"),
                Err(e) => warn!(
                    msg_id = msg_id,
                    read_ct = message.read_ct,
                    class = %e.classify(),
                    error = %e,
                    "Message failed"
                ),
            }
            Disposition::for_result(&result)
        }
        Err(e) => {
            warn!(msg_id = msg_id, error = %e, "Unroutable inbound message");
            Disposition::Archive
        }
    };

    let applied = match disposition {
        Disposition::Ack => queue.ack(msg_id).await,
        Disposition::Archive => queue.archive(msg_id).await,
        Disposition::Retry => queue.release(msg_id).await,
    };
    if let Err(e) = applied {
        warn!(msg_id = msg_id, disposition = ?disposition, error = %e, "Failed to settle inbound message");
    }

    disposition
}
