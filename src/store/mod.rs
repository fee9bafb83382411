//! # Context Store
//!
//! Durable home of execution contexts, one row per correlation id.
//!
//! All mutation happens inside a [`ContextSession`]: opening a session takes
//! an exclusive lock on the correlation id for the whole orchestration pass,
//! so two messages for the same context are never processed concurrently.
//! Dropping a session without committing discards everything saved in it.

pub mod memory;
pub mod postgres;

use crate::context::ContextSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryContextStore;
pub use postgres::PgContextStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Context {correlation_id} is locked by another pass")]
    LockConflict { correlation_id: Uuid },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt context {correlation_id}: {reason}")]
    Corrupt { correlation_id: Uuid, reason: String },

    #[error("Commit failed: {0}")]
    CommitFailed(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ContextStore: Send + Sync {
    /// Lock the context row for `correlation_id` and start a session.
    async fn open(&self, correlation_id: Uuid) -> StoreResult<Box<dyn ContextSession>>;

    /// Read the committed snapshot without locking
    async fn load(&self, correlation_id: Uuid) -> StoreResult<Option<ContextSnapshot>>;

    /// Suspended contexts whose last pass is older than `older_than`, oldest first
    async fn list_stale_suspended(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ContextSnapshot>>;

    /// Move a suspended context's `updated_at` to `at`, provided no pass has
    /// touched it since `seen_updated_at`. Returns whether the row changed.
    async fn touch_suspended(
        &self,
        correlation_id: Uuid,
        seen_updated_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Delete terminal contexts last updated before `older_than`
    async fn delete_terminal_before(&self, older_than: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait ContextSession: Send {
    /// The committed snapshot as of when the lock was taken
    fn current(&self) -> Option<&ContextSnapshot>;

    async fn save(&mut self, snapshot: &ContextSnapshot) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
