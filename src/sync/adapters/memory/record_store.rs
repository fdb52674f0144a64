//! In-memory task record store for tests and single-process deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::sync::{
    domain::{MigrationId, SyncStatus, SyncTask, SyncTaskId, UserId},
    ports::{TaskRecordStore, TaskStoreError, TaskStoreResult},
};

/// Thread-safe in-memory task record store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRecordStore {
    state: Arc<RwLock<InMemoryRecordState>>,
}

#[derive(Debug, Default)]
struct InMemoryRecordState {
    tasks: HashMap<SyncTaskId, SyncTask>,
    user_index: HashMap<UserId, Vec<SyncTaskId>>,
}

impl InMemoryTaskRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned(err: &impl ToString) -> TaskStoreError {
    TaskStoreError::persistence(std::io::Error::other(err.to_string()))
}

/// Collects a user's tasks in insertion order.
fn tasks_for_user<'a>(state: &'a InMemoryRecordState, user_id: &UserId) -> Vec<&'a SyncTask> {
    state
        .user_index
        .get(user_id)
        .map(|ids| ids.iter().filter_map(|id| state.tasks.get(id)).collect())
        .unwrap_or_default()
}

#[async_trait]
impl TaskRecordStore for InMemoryTaskRecordStore {
    async fn create(&self, task: &SyncTask) -> TaskStoreResult<()> {
        let mut state = self.state.write().map_err(|err| poisoned(&err))?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskStoreError::DuplicateTask(task.id()));
        }
        state
            .user_index
            .entry(task.user_id().clone())
            .or_default()
            .push(task.id());
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: SyncTaskId) -> TaskStoreResult<Option<SyncTask>> {
        let state = self.state.read().map_err(|err| poisoned(&err))?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn update(&self, task: &SyncTask, expected: SyncStatus) -> TaskStoreResult<()> {
        let mut state = self.state.write().map_err(|err| poisoned(&err))?;
        let stored = state
            .tasks
            .get_mut(&task.id())
            .ok_or(TaskStoreError::NotFound(task.id()))?;
        if stored.status() != expected {
            return Err(TaskStoreError::Conflict {
                task_id: task.id(),
                expected,
                found: stored.status(),
            });
        }
        *stored = task.clone();
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> TaskStoreResult<Vec<SyncTask>> {
        let state = self.state.read().map_err(|err| poisoned(&err))?;
        let mut tasks = tasks_for_user(&state, user_id);
        // Insertion order breaks ties between equal timestamps.
        tasks.reverse();
        tasks.sort_by(|left, right| right.created_at().cmp(&left.created_at()));
        Ok(tasks.into_iter().take(limit).cloned().collect())
    }

    async fn list_unfinished(&self) -> TaskStoreResult<Vec<SyncTask>> {
        let state = self.state.read().map_err(|err| poisoned(&err))?;
        let mut tasks: Vec<SyncTask> = state
            .tasks
            .values()
            .filter(|task| task.status().is_active())
            .cloned()
            .collect();
        tasks.sort_by_key(SyncTask::updated_at);
        Ok(tasks)
    }

    async fn list_for_migration(
        &self,
        user_id: &UserId,
        migration_id: MigrationId,
    ) -> TaskStoreResult<Vec<SyncTask>> {
        let state = self.state.read().map_err(|err| poisoned(&err))?;
        Ok(tasks_for_user(&state, user_id)
            .into_iter()
            .filter(|task| task.migration_id() == Some(migration_id))
            .cloned()
            .collect())
    }
}
