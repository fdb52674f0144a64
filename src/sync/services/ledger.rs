//! Dual-write coordination over the active task cache and the record store.

use crate::sync::{
    domain::{SyncStatus, SyncTask, SyncTaskId},
    ports::{ActiveCacheError, ActiveTaskCache, TaskRecordStore, TaskStoreError},
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::Mutex as AsyncMutex;

/// Errors raised while reading or writing task records.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The cache rejected or failed the operation; nothing was written.
    #[error(transparent)]
    Cache(#[from] ActiveCacheError),

    /// The store failed and the cache holds no write for it.
    #[error(transparent)]
    Store(TaskStoreError),

    /// The cache accepted the write and the store did not.
    #[error("task {task_id} diverged between cache and record store: {source}")]
    Diverged {
        /// Task whose records disagree.
        task_id: SyncTaskId,
        /// Store failure that followed the cache write.
        source: TaskStoreError,
    },
}

impl LedgerError {
    /// Returns the status that won when the write lost a compare-and-swap
    /// race in either store.
    #[must_use]
    pub const fn lost_race(&self) -> Option<SyncStatus> {
        match self {
            Self::Cache(ActiveCacheError::Conflict { found, .. })
            | Self::Store(TaskStoreError::Conflict { found, .. }) => Some(*found),
            _ => None,
        }
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Writes every task change to the cache, then to the record store.
///
/// Writes to one task are serialized, so the cache and store pair is never
/// interleaved with another writer's pair. A store failure after a
/// successful cache write is reported as [`LedgerError::Diverged`] and
/// logged at error level. No rollback is attempted.
pub struct TaskLedger<S, A>
where
    S: TaskRecordStore,
    A: ActiveTaskCache,
{
    store: Arc<S>,
    cache: Arc<A>,
    locks: Arc<TaskLocks>,
}

/// One async mutex per task with a write in flight or still possible.
#[derive(Debug, Default)]
struct TaskLocks {
    held: Mutex<HashMap<SyncTaskId, Arc<AsyncMutex<()>>>>,
}

impl TaskLocks {
    fn for_task(&self, id: SyncTaskId) -> Arc<AsyncMutex<()>> {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(held.entry(id).or_default())
    }

    /// Terminal tasks accept no further writes.
    fn forget(&self, id: SyncTaskId) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(&id);
    }
}

impl<S, A> Clone for TaskLedger<S, A>
where
    S: TaskRecordStore,
    A: ActiveTaskCache,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<S, A> TaskLedger<S, A>
where
    S: TaskRecordStore,
    A: ActiveTaskCache,
{
    /// Creates a ledger over the two stores.
    #[must_use]
    pub fn new(store: Arc<S>, cache: Arc<A>) -> Self {
        Self {
            store,
            cache,
            locks: Arc::default(),
        }
    }

    /// Returns the record store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the active task cache.
    #[must_use]
    pub fn cache(&self) -> &A {
        &self.cache
    }

    /// Records a newly created task: claims the user's cache slot, then
    /// inserts the store row.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Cache`] when the claim is rejected (including
    /// [`ActiveCacheError::ActiveTaskExists`]) and
    /// [`LedgerError::Diverged`] when the store insert fails afterwards.
    pub async fn open(&self, task: &SyncTask) -> LedgerResult<()> {
        self.cache.claim(task).await?;
        self.store
            .create(task)
            .await
            .map_err(|source| diverged(task.id(), source))
    }

    /// Records a status change guarded by the status the caller observed.
    ///
    /// # Errors
    ///
    /// Returns an error whose [`LedgerError::lost_race`] is set when another
    /// writer changed the task first, and [`LedgerError::Diverged`] when the
    /// store write fails after the cache write succeeded. A task the cache
    /// no longer holds is guarded by the store alone, and its failures are
    /// [`LedgerError::Store`].
    pub async fn record(&self, task: &SyncTask, expected: SyncStatus) -> LedgerResult<()> {
        let lock = self.locks.for_task(task.id());
        let _serialized = lock.lock().await;

        let cache_written = match self.cache.update(task, expected).await {
            Ok(()) => true,
            Err(ActiveCacheError::NotCached(_)) => false,
            Err(err) => return Err(err.into()),
        };
        let stored = self.store.update(task, expected).await;
        if stored.is_ok() && task.status().is_terminal() {
            self.locks.forget(task.id());
        }
        match stored {
            Ok(()) => {}
            Err(source) if cache_written => return Err(diverged(task.id(), source)),
            Err(source) => return Err(LedgerError::Store(source)),
        }
        tracing::debug!(
            task_id = %task.id(),
            from = %expected,
            to = %task.status(),
            "task status recorded"
        );
        Ok(())
    }

    /// Loads a task from the cache, falling back to the record store.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Cache`] or [`LedgerError::Store`] when a
    /// lookup fails.
    pub async fn load(&self, id: SyncTaskId) -> LedgerResult<Option<SyncTask>> {
        if let Some(task) = self.cache.get(id).await? {
            return Ok(Some(task));
        }
        self.store.find_by_id(id).await.map_err(LedgerError::Store)
    }
}

fn diverged(task_id: SyncTaskId, source: TaskStoreError) -> LedgerError {
    tracing::error!(
        %task_id,
        error = %source,
        "record store write failed after cache write; task history is inconsistent"
    );
    LedgerError::Diverged { task_id, source }
}
