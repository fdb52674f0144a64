//! Active task cache port for live polling and continuation state.

use crate::sync::domain::{SyncStatus, SyncTask, SyncTaskId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for active task cache operations.
pub type ActiveCacheResult<T> = Result<T, ActiveCacheError>;

/// Low-latency snapshot store for tasks that are live or recently finished.
///
/// Each user has at most one current entry. A terminal entry stays readable
/// until the user's next task claims the slot.
#[async_trait]
pub trait ActiveTaskCache: Send + Sync {
    /// Returns the cached snapshot for a task.
    async fn get(&self, id: SyncTaskId) -> ActiveCacheResult<Option<SyncTask>>;

    /// Returns the user's non-terminal task, if any.
    async fn get_running(&self, user_id: &UserId) -> ActiveCacheResult<Option<SyncTask>>;

    /// Installs a new task as the user's current entry.
    ///
    /// A terminal entry previously current for the user is retired.
    ///
    /// # Errors
    ///
    /// Returns [`ActiveCacheError::ActiveTaskExists`] when the user already
    /// has a non-terminal task and [`ActiveCacheError::DuplicateTask`] when
    /// the identifier is cached.
    async fn claim(&self, task: &SyncTask) -> ActiveCacheResult<()>;

    /// Replaces the cached snapshot if its status still equals `expected`.
    ///
    /// A task missing from the cache (for example after a restart) is
    /// restored as the user's current entry.
    ///
    /// # Errors
    ///
    /// Returns [`ActiveCacheError::Conflict`] when the cached status differs,
    /// [`ActiveCacheError::ActiveTaskExists`] when restoring would give the
    /// user two non-terminal tasks, and [`ActiveCacheError::NotCached`] when
    /// the task is absent and a newer task holds the user's slot. Nothing is
    /// written in any of these cases.
    async fn update(&self, task: &SyncTask, expected: SyncStatus) -> ActiveCacheResult<()>;

    /// Lists non-terminal tasks last updated before `cutoff`.
    async fn list_stale(&self, cutoff: DateTime<Utc>) -> ActiveCacheResult<Vec<SyncTask>>;
}

/// Errors returned by active task cache implementations.
#[derive(Debug, Clone, Error)]
pub enum ActiveCacheError {
    /// The user already has a non-terminal task.
    #[error("user {user_id} already has task {task_id} {status}")]
    ActiveTaskExists {
        /// Owner of both tasks.
        user_id: UserId,
        /// The existing non-terminal task.
        task_id: SyncTaskId,
        /// Status of the existing task.
        status: SyncStatus,
    },

    /// A task with the same identifier is already cached.
    #[error("duplicate cached task: {0}")]
    DuplicateTask(SyncTaskId),

    /// The cached status differed from the expected one.
    #[error("cached task {task_id} is {found}, expected {expected}")]
    Conflict {
        /// Task whose update was rejected.
        task_id: SyncTaskId,
        /// Status the writer observed before mutating.
        expected: SyncStatus,
        /// Status currently cached.
        found: SyncStatus,
    },

    /// The task is not cached and cannot be restored because another task
    /// holds the user's slot. The status could not be checked.
    #[error("task {0} is not cached")]
    NotCached(SyncTaskId),

    /// The cache backend failed.
    #[error("cache unavailable: {0}")]
    Unavailable(Arc<dyn std::error::Error + Send + Sync>),
}

impl ActiveCacheError {
    /// Wraps a backend error.
    pub fn unavailable(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Unavailable(Arc::new(err))
    }
}
