//! In-memory active task cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::sync::{
    domain::{SyncStatus, SyncTask, SyncTaskId, UserId},
    ports::{ActiveCacheError, ActiveCacheResult, ActiveTaskCache},
};

/// Thread-safe in-memory active task cache.
///
/// Holds at most one entry per user: the user's current task, live or
/// recently finished.
#[derive(Debug, Clone, Default)]
pub struct InMemoryActiveTaskCache {
    state: Arc<RwLock<ActiveCacheState>>,
}

#[derive(Debug, Default)]
struct ActiveCacheState {
    entries: HashMap<SyncTaskId, SyncTask>,
    current: HashMap<UserId, SyncTaskId>,
}

impl ActiveCacheState {
    /// Returns the user's current entry when it is still non-terminal.
    fn active_for(&self, user_id: &UserId) -> Option<&SyncTask> {
        self.current
            .get(user_id)
            .and_then(|id| self.entries.get(id))
            .filter(|task| task.status().is_active())
    }

    /// Makes `task` the user's current entry, retiring the previous one.
    fn install(&mut self, task: &SyncTask) {
        if let Some(previous) = self.current.insert(task.user_id().clone(), task.id())
            && previous != task.id()
        {
            self.entries.remove(&previous);
        }
        self.entries.insert(task.id(), task.clone());
    }
}

impl InMemoryActiveTaskCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of cached entries.
    ///
    /// # Errors
    ///
    /// Returns [`ActiveCacheError::Unavailable`] when the lock is poisoned.
    pub fn len(&self) -> ActiveCacheResult<usize> {
        let state = self.state.read().map_err(|err| unavailable(&err))?;
        Ok(state.entries.len())
    }

    /// Returns `true` when nothing is cached.
    ///
    /// # Errors
    ///
    /// Returns [`ActiveCacheError::Unavailable`] when the lock is poisoned.
    pub fn is_empty(&self) -> ActiveCacheResult<bool> {
        Ok(self.len()? == 0)
    }
}

fn unavailable(err: &impl ToString) -> ActiveCacheError {
    ActiveCacheError::unavailable(std::io::Error::other(err.to_string()))
}

fn ensure_no_other_active(
    state: &ActiveCacheState,
    task: &SyncTask,
) -> ActiveCacheResult<()> {
    match state.active_for(task.user_id()) {
        Some(existing) if existing.id() != task.id() => Err(ActiveCacheError::ActiveTaskExists {
            user_id: task.user_id().clone(),
            task_id: existing.id(),
            status: existing.status(),
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl ActiveTaskCache for InMemoryActiveTaskCache {
    async fn get(&self, id: SyncTaskId) -> ActiveCacheResult<Option<SyncTask>> {
        let state = self.state.read().map_err(|err| unavailable(&err))?;
        Ok(state.entries.get(&id).cloned())
    }

    async fn get_running(&self, user_id: &UserId) -> ActiveCacheResult<Option<SyncTask>> {
        let state = self.state.read().map_err(|err| unavailable(&err))?;
        Ok(state.active_for(user_id).cloned())
    }

    async fn claim(&self, task: &SyncTask) -> ActiveCacheResult<()> {
        let mut state = self.state.write().map_err(|err| unavailable(&err))?;
        if state.entries.contains_key(&task.id()) {
            return Err(ActiveCacheError::DuplicateTask(task.id()));
        }
        ensure_no_other_active(&state, task)?;
        state.install(task);
        Ok(())
    }

    async fn update(&self, task: &SyncTask, expected: SyncStatus) -> ActiveCacheResult<()> {
        let mut state = self.state.write().map_err(|err| unavailable(&err))?;
        if let Some(cached) = state.entries.get_mut(&task.id()) {
            if cached.status() != expected {
                return Err(ActiveCacheError::Conflict {
                    task_id: task.id(),
                    expected,
                    found: cached.status(),
                });
            }
            *cached = task.clone();
            return Ok(());
        }

        // Not cached: restore it, unless another task owns the user's slot.
        if task.status().is_active() {
            ensure_no_other_active(&state, task)?;
        }
        let slot_taken = state
            .current
            .get(task.user_id())
            .and_then(|id| state.entries.get(id))
            .is_some_and(|current| {
                current.status().is_active() || current.created_at() > task.created_at()
            });
        if slot_taken {
            return Err(ActiveCacheError::NotCached(task.id()));
        }
        state.install(task);
        Ok(())
    }

    async fn list_stale(&self, cutoff: DateTime<Utc>) -> ActiveCacheResult<Vec<SyncTask>> {
        let state = self.state.read().map_err(|err| unavailable(&err))?;
        Ok(state
            .entries
            .values()
            .filter(|task| task.is_stale(cutoff))
            .cloned()
            .collect())
    }
}
