//! # Messaging Error Types
//!
//! Errors at the message bus boundary. Validation errors mark inbound
//! messages that can never be processed; everything else is transport.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Queue connection error: {message}")]
    Connection { message: String },

    #[error("Queue operation failed: {queue_name}: {operation}: {message}")]
    QueueOperation {
        queue_name: String,
        operation: String,
        message: String,
    },

    #[error("Message serialization error: {message}")]
    Serialization { message: String },

    /// Inbound message that cannot be routed to an orchestration pass
    #[error("Invalid message: {message}")]
    Validation { message: String },
}

impl MessagingError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn queue_operation(
        queue_name: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::QueueOperation {
            queue_name: queue_name.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Malformed input is never worth redelivering
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Outbound payloads are built in-process, so a failure here is ours
impl From<serde_json::Error> for MessagingError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

pub type MessagingResult<T> = Result<T, MessagingError>;
