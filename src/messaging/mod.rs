//! # Messaging Module
//!
//! PostgreSQL message queue (pgmq) based messaging at the bus boundary:
//! inbound envelopes and their classification into domain events, outbound
//! request and cancellation messages, and the queue/publisher seams the
//! orchestrator and consumer depend on.

pub mod classifier;
pub mod errors;
pub mod message;
pub mod pgmq_client;
pub mod publisher;
pub mod queue;

pub use classifier::Classifier;
pub use errors::{MessagingError, MessagingResult};
pub use message::{CancellationMessage, Envelope, RequestMessage};
pub use pgmq_client::PgmqClient;
pub use publisher::{InMemoryPublisher, OutboundPublisher, PgmqPublisher};
pub use queue::{InMemoryQueue, InboundMessage, InboundQueue, PgmqInboundQueue};
