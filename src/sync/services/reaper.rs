//! Fails tasks orphaned in a non-terminal state.

use super::{
    error::SyncResult,
    ledger::TaskLedger,
};
use crate::sync::{
    domain::{SyncTask, SyncTaskId},
    ports::{ActiveTaskCache, TaskRecordStore},
};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use std::sync::Arc;

/// Error recorded on tasks failed by [`StaleTaskReaper::recover_after_restart`].
pub const INTERRUPTED_ERROR: &str = "interrupted: the engine restarted before the task finished";

/// Identifiers of the tasks failed by one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// Tasks moved to `failed`, in sweep order.
    pub reaped: Vec<SyncTaskId>,
}

impl ReapReport {
    /// Returns the number of failed tasks.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.reaped.len()
    }

    /// Returns `true` when nothing was reaped.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.reaped.is_empty()
    }
}

/// On-demand sweep over tasks whose chunk never reported back.
///
/// A task is stale when it is non-terminal and its `updated_at` is older
/// than the configured threshold. Each stale task is failed through the
/// ledger with a compare-and-swap on the status the sweep observed, so a
/// task that moved in the meantime is left alone.
pub struct StaleTaskReaper<S, A, C>
where
    S: TaskRecordStore,
    A: ActiveTaskCache,
    C: Clock + Send + Sync,
{
    ledger: TaskLedger<S, A>,
    clock: Arc<C>,
    stale_after: TimeDelta,
}

impl<S, A, C> Clone for StaleTaskReaper<S, A, C>
where
    S: TaskRecordStore,
    A: ActiveTaskCache,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            clock: Arc::clone(&self.clock),
            stale_after: self.stale_after,
        }
    }
}

impl<S, A, C> StaleTaskReaper<S, A, C>
where
    S: TaskRecordStore,
    A: ActiveTaskCache,
    C: Clock + Send + Sync,
{
    /// Creates a reaper failing tasks idle for longer than `stale_after`.
    #[must_use]
    pub const fn new(ledger: TaskLedger<S, A>, clock: Arc<C>, stale_after: TimeDelta) -> Self {
        Self {
            ledger,
            clock,
            stale_after,
        }
    }

    /// Returns the liveness threshold.
    #[must_use]
    pub const fn stale_after(&self) -> TimeDelta {
        self.stale_after
    }

    /// Fails every cached task that has been idle past the threshold.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`](super::SyncError) when the cache cannot be read
    /// or a write fails for a reason other than a lost race.
    pub async fn reap(&self) -> SyncResult<ReapReport> {
        let cutoff = self
            .clock
            .utc()
            .checked_sub_signed(self.stale_after)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let stale = self.ledger.cache().list_stale(cutoff).await?;

        let mut report = ReapReport::default();
        for task in stale {
            let task_id = task.id();
            let reason = format!(
                "stale: no progress since {}, presumed orphaned",
                task.updated_at().to_rfc3339()
            );
            if self.fail_observed(task, reason).await? {
                report.reaped.push(task_id);
            }
        }
        Ok(report)
    }

    /// Fails every task the record store still holds as unfinished.
    ///
    /// Intended for process start, before any chunk is scheduled: no chunk
    /// survives a restart, so every unfinished task is orphaned.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`](super::SyncError) when the store cannot be read
    /// or a write fails for a reason other than a lost race.
    pub async fn recover_after_restart(&self) -> SyncResult<ReapReport> {
        let unfinished = self.ledger.store().list_unfinished().await?;
        let mut report = ReapReport::default();
        for task in unfinished {
            let task_id = task.id();
            if self.fail_observed(task, INTERRUPTED_ERROR.to_owned()).await? {
                report.reaped.push(task_id);
            }
        }
        Ok(report)
    }

    /// Fails `task` unless its status moved since it was read. Returns
    /// whether the failure was recorded.
    async fn fail_observed(&self, mut task: SyncTask, reason: String) -> SyncResult<bool> {
        let observed = task.status();
        task.fail(reason, &*self.clock)?;
        let Err(err) = self.ledger.record(&task, observed).await else {
            tracing::warn!(
                task_id = %task.id(),
                user_id = %task.user_id(),
                status = %observed,
                error = task.error().unwrap_or_default(),
                "failed orphaned sync task"
            );
            return Ok(true);
        };
        let Some(found) = err.lost_race() else {
            return Err(err.into());
        };
        tracing::debug!(
            task_id = %task.id(),
            expected = %observed,
            %found,
            "orphaned task moved before it could be failed"
        );
        Ok(false)
    }
}
