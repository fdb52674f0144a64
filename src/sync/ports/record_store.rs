//! Durable record store port for sync task history.

use crate::sync::domain::{MigrationId, SyncStatus, SyncTask, SyncTaskId, UserId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task record store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// System of record for sync tasks.
///
/// Rows survive process restarts and back the migration history view.
#[async_trait]
pub trait TaskRecordStore: Send + Sync {
    /// Stores a newly created task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::DuplicateTask`] when the identifier exists.
    async fn create(&self, task: &SyncTask) -> TaskStoreResult<()>;

    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_by_id(&self, id: SyncTaskId) -> TaskStoreResult<Option<SyncTask>>;

    /// Replaces the stored task if its persisted status still equals
    /// `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when the task does not exist and
    /// [`TaskStoreError::Conflict`] when the stored status differs.
    async fn update(&self, task: &SyncTask, expected: SyncStatus) -> TaskStoreResult<()>;

    /// Lists a user's tasks, newest first, up to `limit` rows.
    async fn list_for_user(&self, user_id: &UserId, limit: usize)
    -> TaskStoreResult<Vec<SyncTask>>;

    /// Lists every non-terminal task, least recently updated first.
    ///
    /// Used to recover tasks orphaned by a process restart, when the active
    /// task cache starts empty.
    async fn list_unfinished(&self) -> TaskStoreResult<Vec<SyncTask>>;

    /// Lists a user's tasks linked to a migration run, oldest first.
    async fn list_for_migration(
        &self,
        user_id: &UserId,
        migration_id: MigrationId,
    ) -> TaskStoreResult<Vec<SyncTask>>;
}

/// Errors returned by task record store implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskStoreError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(SyncTaskId),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(SyncTaskId),

    /// The stored status differed from the expected one.
    #[error("task {task_id} is {found}, expected {expected}")]
    Conflict {
        /// Task whose update was rejected.
        task_id: SyncTaskId,
        /// Status the writer observed before mutating.
        expected: SyncStatus,
        /// Status currently stored.
        found: SyncStatus,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
