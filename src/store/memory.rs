use super::{ContextSession, ContextStore, StoreError, StoreResult};
use crate::context::{ContextSnapshot, ContextStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type Slot = Arc<Mutex<Option<ContextSnapshot>>>;

/// In-memory context store with the same locking semantics as Postgres
pub struct InMemoryContextStore {
    contexts: DashMap<Uuid, Slot>,
    lock_timeout: Duration,
    failing_commits: Arc<AtomicBool>,
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl InMemoryContextStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            contexts: DashMap::new(),
            lock_timeout,
            failing_commits: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every commit fail until reset
    pub fn set_failing_commits(&self, failing: bool) {
        self.failing_commits.store(failing, Ordering::SeqCst);
    }

    /// Insert a committed snapshot directly
    pub async fn seed(&self, snapshot: ContextSnapshot) {
        let slot = self.slot(snapshot.correlation_id);
        *slot.lock().await = Some(snapshot);
    }

    pub fn len(&self) -> usize {
        self.contexts
            .iter()
            .filter(|entry| entry.value().try_lock().map(|g| g.is_some()).unwrap_or(true))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, correlation_id: Uuid) -> Slot {
        self.contexts
            .entry(correlation_id)
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone()
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    async fn open(&self, correlation_id: Uuid) -> StoreResult<Box<dyn ContextSession>> {
        let slot = self.slot(correlation_id);
        let guard = tokio::time::timeout(self.lock_timeout, slot.lock_owned())
            .await
            .map_err(|_| StoreError::LockConflict { correlation_id })?;

        Ok(Box::new(InMemorySession {
            guard,
            staged: None,
            failing_commits: self.failing_commits.clone(),
        }))
    }

    async fn load(&self, correlation_id: Uuid) -> StoreResult<Option<ContextSnapshot>> {
        let Some(slot) = self.contexts.get(&correlation_id).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        let snapshot = slot.lock().await.clone();
        Ok(snapshot)
    }

    async fn list_stale_suspended(
        &self,
        older_than: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<Vec<ContextSnapshot>> {
        let mut stale: Vec<ContextSnapshot> = self
            .contexts
            .iter()
            .filter_map(|entry| {
                // Contexts locked by a running pass are not stale
                let guard = entry.value().try_lock().ok()?;
                guard
                    .as_ref()
                    .filter(|s| s.status == ContextStatus::Suspended && s.updated_at < older_than)
                    .cloned()
            })
            .collect();

        stale.sort_by_key(|s| s.updated_at);
        stale.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(stale)
    }

    async fn touch_suspended(
        &self,
        correlation_id: Uuid,
        seen_updated_at: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let Some(slot) = self.contexts.get(&correlation_id).map(|e| e.value().clone()) else {
            return Ok(false);
        };
        // A pass holding the lock will write its own timestamp
        let Ok(mut guard) = slot.try_lock() else {
            return Ok(false);
        };
        match guard.as_mut() {
            Some(snapshot)
                if snapshot.status == ContextStatus::Suspended
                    && snapshot.updated_at == seen_updated_at =>
            {
                snapshot.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_terminal_before(&self, older_than: DateTime<Utc>) -> StoreResult<u64> {
        let mut deleted = 0u64;
        self.contexts.retain(|_, slot| match slot.try_lock() {
            Ok(guard) => {
                let expired = guard
                    .as_ref()
                    .map(|s| s.status.is_terminal() && s.updated_at < older_than)
                    .unwrap_or(false);
                if expired {
                    deleted += 1;
                }
                !expired
            }
            Err(_) => true,
        });
        Ok(deleted)
    }
}

struct InMemorySession {
    guard: OwnedMutexGuard<Option<ContextSnapshot>>,
    staged: Option<ContextSnapshot>,
    failing_commits: Arc<AtomicBool>,
}

#[async_trait]
impl ContextSession for InMemorySession {
    fn current(&self) -> Option<&ContextSnapshot> {
        self.guard.as_ref()
    }

    async fn save(&mut self, snapshot: &ContextSnapshot) -> StoreResult<()> {
        self.staged = Some(snapshot.clone());
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        if self.failing_commits.load(Ordering::SeqCst) {
            return Err(StoreError::CommitFailed(
                "in-memory store rejecting commits".to_string(),
            ));
        }
        if let Some(staged) = self.staged.take() {
            *self.guard = Some(staged);
        }
        Ok(())
    }
}
