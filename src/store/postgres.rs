use super::{ContextSession, ContextStore, StoreError, StoreResult};
use crate::context::{ContextSnapshot, ContextStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

/// SQLSTATE codes meaning another pass holds the context
const LOCK_NOT_AVAILABLE: &str = "55P03";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

const SELECT_CONTEXT: &str = r#"
    SELECT correlation_id, sequence_kind, status, payload, answers, pending_requests,
           processed_message_ids, failure, created_at, updated_at
    FROM execution_contexts
"#;

#[derive(Debug, sqlx::FromRow)]
struct ContextRow {
    correlation_id: Uuid,
    sequence_kind: String,
    status: String,
    payload: serde_json::Value,
    answers: serde_json::Value,
    pending_requests: serde_json::Value,
    processed_message_ids: serde_json::Value,
    failure: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContextRow> for ContextSnapshot {
    type Error = StoreError;

    fn try_from(row: ContextRow) -> StoreResult<Self> {
        let correlation_id = row.correlation_id;
        let corrupt = |reason: String| StoreError::Corrupt {
            correlation_id,
            reason,
        };

        Ok(ContextSnapshot {
            correlation_id,
            sequence: row.sequence_kind.parse().map_err(corrupt)?,
            status: row.status.parse().map_err(corrupt)?,
            payload: serde_json::from_value(row.payload)
                .map_err(|e| corrupt(format!("payload: {e}")))?,
            answers: serde_json::from_value(row.answers)
                .map_err(|e| corrupt(format!("answers: {e}")))?,
            pending_requests: serde_json::from_value(row.pending_requests)
                .map_err(|e| corrupt(format!("pending_requests: {e}")))?,
            processed_message_ids: serde_json::from_value(row.processed_message_ids)
                .map_err(|e| corrupt(format!("processed_message_ids: {e}")))?,
            failure: row
                .failure
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| corrupt(format!("failure: {e}")))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Postgres context store.
///
/// A session is one transaction holding a transaction-scoped advisory lock on
/// the correlation id, which also covers contexts whose row does not exist yet.
#[derive(Debug, Clone)]
pub struct PgContextStore {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgContextStore {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self {
            pool,
            lock_timeout_ms,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Advisory lock key for a correlation id
fn lock_key(correlation_id: Uuid) -> i64 {
    let (hi, lo) = correlation_id.as_u64_pair();
    (hi ^ lo) as i64
}

fn map_lock_error(correlation_id: Uuid, err: sqlx::Error) -> StoreError {
    let code = err
        .as_database_error()
        .and_then(|db| db.code())
        .map(|c| c.into_owned());
    match code.as_deref() {
        Some(LOCK_NOT_AVAILABLE | SERIALIZATION_FAILURE | DEADLOCK_DETECTED) => {
            StoreError::LockConflict { correlation_id }
        }
        _ => StoreError::from(err),
    }
}

#[async_trait]
impl ContextStore for PgContextStore {
    async fn open(&self, correlation_id: Uuid) -> StoreResult<Box<dyn ContextSession>> {
        let mut tx = self.pool.begin().await?;

        // SET does not take bind parameters
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout_ms
        ))
        .execute(&mut *tx)
        .await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_key(correlation_id))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_lock_error(correlation_id, e))?;

        let row: Option<ContextRow> =
            sqlx::query_as(&format!("{SELECT_CONTEXT} WHERE correlation_id = $1"))
                .bind(correlation_id)
                .fetch_optional(&mut *tx)
                .await?;

        let current = row.map(ContextSnapshot::try_from).transpose()?;
        debug!(
            correlation_id = %correlation_id,
            exists = current.is_some(),
            "Context session opened"
        );

        Ok(Box::new(PgContextSession { tx, current }))
    }

    async fn load(&self, correlation_id: Uuid) -> StoreResult<Option<ContextSnapshot>> {
        let row: Option<ContextRow> =
            sqlx::query_as(&format!("{SELECT_CONTEXT} WHERE correlation_id = $1"))
                .bind(correlation_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(ContextSnapshot::try_from).transpose()
    }

    async fn list_stale_suspended(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ContextSnapshot>> {
        let rows: Vec<ContextRow> = sqlx::query_as(&format!(
            "{SELECT_CONTEXT} WHERE status = $1 AND updated_at < $2 ORDER BY updated_at LIMIT $3"
        ))
        .bind(ContextStatus::Suspended.to_string())
        .bind(older_than)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ContextSnapshot::try_from).collect()
    }

    async fn touch_suspended(
        &self,
        correlation_id: Uuid,
        seen_updated_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE execution_contexts SET updated_at = $3
             WHERE correlation_id = $1 AND status = 'suspended' AND updated_at = $2",
        )
        .bind(correlation_id)
        .bind(seen_updated_at)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_terminal_before(&self, older_than: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM execution_contexts WHERE status IN ('done', 'aborted', 'failed') AND updated_at < $1",
        )
        .bind(older_than)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

struct PgContextSession {
    tx: Transaction<'static, Postgres>,
    current: Option<ContextSnapshot>,
}

#[async_trait]
impl ContextSession for PgContextSession {
    fn current(&self) -> Option<&ContextSnapshot> {
        self.current.as_ref()
    }

    async fn save(&mut self, snapshot: &ContextSnapshot) -> StoreResult<()> {
        let to_json = |value: serde_json::Result<serde_json::Value>| {
            value.map_err(|e| StoreError::Corrupt {
                correlation_id: snapshot.correlation_id,
                reason: e.to_string(),
            })
        };

        sqlx::query(
            r#"
            INSERT INTO execution_contexts (
                correlation_id, sequence_kind, status, payload, answers, pending_requests,
                processed_message_ids, failure, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (correlation_id) DO UPDATE SET
                status = EXCLUDED.status,
                answers = EXCLUDED.answers,
                pending_requests = EXCLUDED.pending_requests,
                processed_message_ids = EXCLUDED.processed_message_ids,
                failure = EXCLUDED.failure,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(snapshot.correlation_id)
        .bind(snapshot.sequence.to_string())
        .bind(snapshot.status.to_string())
        .bind(to_json(serde_json::to_value(&snapshot.payload))?)
        .bind(to_json(serde_json::to_value(&snapshot.answers))?)
        .bind(to_json(serde_json::to_value(&snapshot.pending_requests))?)
        .bind(to_json(serde_json::to_value(&snapshot.processed_message_ids))?)
        .bind(
            snapshot
                .failure
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(|e| StoreError::Corrupt {
                    correlation_id: snapshot.correlation_id,
                    reason: e.to_string(),
                })?,
        )
        .bind(snapshot.created_at)
        .bind(snapshot.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::CommitFailed(e.to_string()))
    }
}
