//! Task orchestration: creation, continuation, cancellation and status reads.

use super::{
    error::{SyncConflict, SyncError, SyncResult},
    ledger::{LedgerError, TaskLedger},
    reaper::{ReapReport, StaleTaskReaper},
};
use crate::config::SyncEngineConfig;
use crate::sync::{
    domain::{
        ChunkState, MigrationId, MigrationSummary, NewSyncTask, SyncDomainError, SyncKind,
        SyncProgress, SyncReport, SyncStatus, SyncTask, SyncTaskId, SyncType, UserId,
    },
    ports::{ActiveTaskCache, ChunkExecutor, ChunkOutcome, ChunkRequest, TaskRecordStore},
};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Cancellation retries after losing a race with a chunk boundary.
const CANCEL_ATTEMPTS: usize = 3;

/// Request payload for starting a sync task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartSyncRequest {
    user_id: UserId,
    sync_type: SyncType,
    dry_run: bool,
    migration_id: Option<MigrationId>,
    playlists: Vec<String>,
}

impl StartSyncRequest {
    /// Creates a request that applies writes to every source playlist and
    /// belongs to no migration.
    #[must_use]
    pub const fn new(user_id: UserId, sync_type: SyncType) -> Self {
        Self {
            user_id,
            sync_type,
            dry_run: false,
            migration_id: None,
            playlists: Vec::new(),
        }
    }

    /// Sets whether destination writes are suppressed.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Links the task to a migration run.
    #[must_use]
    pub const fn with_migration(mut self, migration_id: MigrationId) -> Self {
        self.migration_id = Some(migration_id);
        self
    }

    /// Restricts a playlist migration to the named source playlists.
    #[must_use]
    pub fn with_playlists<I, N>(mut self, playlists: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<String>,
    {
        self.playlists = playlists.into_iter().map(Into::into).collect();
        self
    }
}

/// Acknowledgement returned before any chunk work happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReceipt {
    /// Affected task.
    pub task_id: SyncTaskId,
    /// Status recorded when the request completed.
    pub status: SyncStatus,
}

impl SyncReceipt {
    fn of(task: &SyncTask) -> Self {
        Self {
            task_id: task.id(),
            status: task.status(),
        }
    }
}

/// Read model returned to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatusView {
    /// Task identifier.
    pub task_id: SyncTaskId,
    /// Task owner.
    pub user_id: UserId,
    /// Kind and direction.
    pub sync_type: SyncType,
    /// Whether destination writes are suppressed.
    pub dry_run: bool,
    /// Migration run link.
    pub migration_id: Option<MigrationId>,
    /// Selected source playlists; empty means all.
    pub playlists: Vec<String>,
    /// Lifecycle status.
    pub status: SyncStatus,
    /// Progress counters.
    pub progress: SyncProgress,
    /// Completion in whole percent, once the source size is known.
    pub percent: Option<u8>,
    /// Completion report.
    pub report: Option<SyncReport>,
    /// Failure description.
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Latest update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<&SyncTask> for TaskStatusView {
    fn from(task: &SyncTask) -> Self {
        Self {
            task_id: task.id(),
            user_id: task.user_id().clone(),
            sync_type: task.sync_type(),
            dry_run: task.dry_run(),
            migration_id: task.migration_id(),
            playlists: task.playlists().to_vec(),
            status: task.status(),
            progress: task.progress(),
            percent: task.progress().percent(),
            report: task.report().cloned(),
            error: task.error().map(str::to_owned),
            created_at: task.created_at(),
            updated_at: task.updated_at(),
        }
    }
}

/// Accepted start or continuation: the receipt to answer with and the chunk
/// to run once the answer is committed.
#[must_use = "the chunk must be spawned or run for the task to make progress"]
pub struct Accepted<S, A, E, C>
where
    S: TaskRecordStore,
    A: ActiveTaskCache,
    E: ChunkExecutor,
    C: Clock + Send + Sync,
{
    /// Acknowledgement for the caller.
    pub receipt: SyncReceipt,
    /// The chunk scheduled by the request.
    pub chunk: ScheduledChunk<S, A, E, C>,
}

/// What became of a chunk's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDisposition {
    /// The outcome was recorded and the task is now in this status.
    Applied(SyncStatus),
    /// The task had left `running`; the outcome was dropped.
    Discarded(SyncStatus),
}

/// One detached unit of chunk work.
///
/// Carries the resume cursor captured when it was scheduled. Either
/// [`spawn`](Self::spawn) it onto the runtime or [`run`](Self::run) it
/// inline.
#[must_use = "the chunk must be spawned or run for the task to make progress"]
pub struct ScheduledChunk<S, A, E, C>
where
    S: TaskRecordStore,
    A: ActiveTaskCache,
    E: ChunkExecutor,
    C: Clock + Send + Sync,
{
    orchestrator: SyncOrchestrator<S, A, E, C>,
    task_id: SyncTaskId,
    cursor: Option<ChunkState>,
}

impl<S, A, E, C> ScheduledChunk<S, A, E, C>
where
    S: TaskRecordStore,
    A: ActiveTaskCache,
    E: ChunkExecutor,
    C: Clock + Send + Sync,
{
    /// Returns the task this chunk advances.
    #[must_use]
    pub const fn task_id(&self) -> SyncTaskId {
        self.task_id
    }

    /// Returns the offset the chunk starts from.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.cursor.as_ref().map_or(0, |cursor| cursor.offset)
    }

    /// Executes the chunk and records its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the task vanished or a write failed.
    /// Losing a race against cancellation or the reaper is not an error; the
    /// outcome is discarded.
    pub async fn run(self) -> SyncResult<ChunkDisposition> {
        let Self {
            orchestrator,
            task_id,
            cursor,
        } = self;
        orchestrator.run_chunk(task_id, cursor).await
    }
}

impl<S, A, E, C> ScheduledChunk<S, A, E, C>
where
    S: TaskRecordStore + 'static,
    A: ActiveTaskCache + 'static,
    E: ChunkExecutor + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Runs the chunk on the current Tokio runtime, logging failures.
    pub fn spawn(self) -> JoinHandle<()> {
        let task_id = self.task_id;
        tokio::spawn(async move {
            if let Err(err) = self.run().await {
                tracing::error!(%task_id, error = %err, "background chunk failed");
            }
        })
    }
}

/// Owns the sync task state machine.
///
/// Every status write goes through the [`TaskLedger`]; chunk work is
/// handed back to the caller as a [`ScheduledChunk`].
pub struct SyncOrchestrator<S, A, E, C>
where
    S: TaskRecordStore,
    A: ActiveTaskCache,
    E: ChunkExecutor,
    C: Clock + Send + Sync,
{
    ledger: TaskLedger<S, A>,
    executor: Arc<E>,
    clock: Arc<C>,
    reaper: StaleTaskReaper<S, A, C>,
    history_limit: usize,
}

impl<S, A, E, C> Clone for SyncOrchestrator<S, A, E, C>
where
    S: TaskRecordStore,
    A: ActiveTaskCache,
    E: ChunkExecutor,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            executor: Arc::clone(&self.executor),
            clock: Arc::clone(&self.clock),
            reaper: self.reaper.clone(),
            history_limit: self.history_limit,
        }
    }
}

impl<S, A, E, C> SyncOrchestrator<S, A, E, C>
where
    S: TaskRecordStore,
    A: ActiveTaskCache,
    E: ChunkExecutor,
    C: Clock + Send + Sync,
{
    /// Creates an orchestrator with the default configuration.
    #[must_use]
    pub fn new(store: Arc<S>, cache: Arc<A>, executor: Arc<E>, clock: Arc<C>) -> Self {
        Self::with_config(store, cache, executor, clock, &SyncEngineConfig::default())
    }

    /// Creates an orchestrator using `config` for staleness and history
    /// limits. The chunk size belongs to the executor.
    #[must_use]
    pub fn with_config(
        store: Arc<S>,
        cache: Arc<A>,
        executor: Arc<E>,
        clock: Arc<C>,
        config: &SyncEngineConfig,
    ) -> Self {
        let ledger = TaskLedger::new(store, cache);
        let stale_after = config.stale_after().unwrap_or(TimeDelta::MAX);
        let reaper = StaleTaskReaper::new(ledger.clone(), Arc::clone(&clock), stale_after);
        Self {
            ledger,
            executor,
            clock,
            reaper,
            history_limit: config.history_limit,
        }
    }

    /// Returns the reaper sharing this orchestrator's stores and clock.
    #[must_use]
    pub const fn reaper(&self) -> &StaleTaskReaper<S, A, C> {
        &self.reaper
    }

    /// Creates a pending task and schedules its first chunk.
    ///
    /// Stale tasks are reaped first, so an orphaned task does not block the
    /// user.
    ///
    /// # Errors
    ///
    /// Returns [`SyncConflict::ActiveTaskExists`] when the user already has a
    /// non-terminal task, [`SyncError::Domain`] when a playlist selection is
    /// given for a favorites migration, and [`SyncError`] for storage
    /// failures.
    pub async fn start_sync(
        &self,
        request: StartSyncRequest,
    ) -> SyncResult<Accepted<S, A, E, C>> {
        let StartSyncRequest {
            user_id,
            sync_type,
            dry_run,
            migration_id,
            playlists,
        } = request;
        if !playlists.is_empty() && sync_type.kind() != SyncKind::Playlists {
            return Err(SyncDomainError::SelectionNotApplicable(sync_type.kind()).into());
        }
        self.reaper.reap().await?;

        let task = SyncTask::new(
            NewSyncTask {
                user_id,
                sync_type,
                dry_run,
                migration_id,
                playlists,
            },
            &*self.clock,
        );
        self.ledger.open(&task).await?;
        tracing::info!(
            task_id = %task.id(),
            user_id = %task.user_id(),
            sync_type = %task.sync_type(),
            dry_run = task.dry_run(),
            "sync task created"
        );

        Ok(Accepted {
            receipt: SyncReceipt::of(&task),
            chunk: self.schedule(task.id(), None),
        })
    }

    /// Resumes a task paused at a chunk boundary and schedules its next
    /// chunk.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] for unknown tasks and tasks owned by
    /// another user, and [`SyncConflict::NotResumable`] unless the task is
    /// in `chunk_complete`. The task is not mutated on error.
    pub async fn continue_sync(
        &self,
        user_id: &UserId,
        task_id: SyncTaskId,
    ) -> SyncResult<Accepted<S, A, E, C>> {
        let mut task = self.load_owned(user_id, task_id).await?;
        let cursor = task.resume(&*self.clock)?;
        self.ledger.record(&task, SyncStatus::ChunkComplete).await?;
        tracing::info!(
            %task_id,
            %user_id,
            offset = cursor.offset,
            "sync task continued"
        );

        Ok(Accepted {
            receipt: SyncReceipt::of(&task),
            chunk: self.schedule(task_id, Some(cursor)),
        })
    }

    /// Cancels a task immediately. A chunk already in flight keeps running
    /// and its outcome is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] for unknown or foreign tasks and
    /// [`SyncConflict::AlreadyTerminal`] for finished tasks.
    pub async fn cancel_sync(
        &self,
        user_id: &UserId,
        task_id: SyncTaskId,
    ) -> SyncResult<SyncReceipt> {
        let mut attempt = 1;
        loop {
            let mut task = self.load_owned(user_id, task_id).await?;
            let observed = task.status();
            if observed.is_terminal() {
                return Err(SyncConflict::AlreadyTerminal {
                    task_id,
                    status: observed,
                }
                .into());
            }
            task.cancel(&*self.clock)?;
            match self.ledger.record(&task, observed).await {
                Ok(()) => {
                    tracing::info!(%task_id, %user_id, from = %observed, "sync task cancelled");
                    return Ok(SyncReceipt::of(&task));
                }
                Err(err) if err.lost_race().is_some() && attempt < CANCEL_ATTEMPTS => {
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Returns the status of one of the user's tasks, preferring the cache.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] for unknown or foreign tasks.
    pub async fn get_status(
        &self,
        user_id: &UserId,
        task_id: SyncTaskId,
    ) -> SyncResult<TaskStatusView> {
        let task = self.load_owned(user_id, task_id).await?;
        Ok(TaskStatusView::from(&task))
    }

    /// Returns the user's non-terminal task, after reaping stale tasks.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the sweep or the cache read fails.
    pub async fn get_active(&self, user_id: &UserId) -> SyncResult<Option<TaskStatusView>> {
        self.reaper.reap().await?;
        let task = self.ledger.cache().get_running(user_id).await?;
        Ok(task.as_ref().map(TaskStatusView::from))
    }

    /// Lists the user's tasks, newest first. `None` uses the configured
    /// history limit.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] when the store read fails.
    pub async fn list_history(
        &self,
        user_id: &UserId,
        limit: Option<usize>,
    ) -> SyncResult<Vec<TaskStatusView>> {
        let tasks = self
            .ledger
            .store()
            .list_for_user(user_id, limit.unwrap_or(self.history_limit))
            .await?;
        Ok(tasks.iter().map(TaskStatusView::from).collect())
    }

    /// Lists the user's tasks for one migration run, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] when the store read fails.
    pub async fn migration_tasks(
        &self,
        user_id: &UserId,
        migration_id: MigrationId,
    ) -> SyncResult<Vec<TaskStatusView>> {
        let tasks = self
            .ledger
            .store()
            .list_for_migration(user_id, migration_id)
            .await?;
        Ok(tasks.iter().map(TaskStatusView::from).collect())
    }

    /// Rolls up one migration run from its tasks.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MigrationNotFound`] when the user has no task in
    /// the run, and [`SyncError::Store`] when the store read fails.
    pub async fn migration_summary(
        &self,
        user_id: &UserId,
        migration_id: MigrationId,
    ) -> SyncResult<MigrationSummary> {
        let tasks = self
            .ledger
            .store()
            .list_for_migration(user_id, migration_id)
            .await?;
        MigrationSummary::from_tasks(migration_id, &tasks)
            .ok_or(SyncError::MigrationNotFound(migration_id))
    }

    /// Lists the user's migration runs, most recently started first. `None`
    /// uses the configured history limit.
    ///
    /// Runs are discovered among the newest tasks in the history window, so
    /// a run whose tasks all fell out of it is not listed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Store`] when a store read fails.
    pub async fn list_migrations(
        &self,
        user_id: &UserId,
        limit: Option<usize>,
    ) -> SyncResult<Vec<MigrationSummary>> {
        let recent = self
            .ledger
            .store()
            .list_for_user(user_id, self.history_limit)
            .await?;
        let mut runs: Vec<MigrationId> = Vec::new();
        for migration_id in recent.iter().filter_map(SyncTask::migration_id) {
            if !runs.contains(&migration_id) {
                runs.push(migration_id);
            }
        }

        let mut summaries = Vec::new();
        for migration_id in runs {
            let tasks = self
                .ledger
                .store()
                .list_for_migration(user_id, migration_id)
                .await?;
            summaries.extend(MigrationSummary::from_tasks(migration_id, &tasks));
        }
        summaries.sort_by(|left, right| right.started_at.cmp(&left.started_at));
        summaries.truncate(limit.unwrap_or(self.history_limit));
        Ok(summaries)
    }

    /// Fails tasks left unfinished by a previous process.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the store read or a write fails.
    pub async fn recover_after_restart(&self) -> SyncResult<ReapReport> {
        let report = self.reaper.recover_after_restart().await?;
        if !report.is_empty() {
            tracing::warn!(count = report.count(), "failed tasks interrupted by restart");
        }
        Ok(report)
    }

    fn schedule(
        &self,
        task_id: SyncTaskId,
        cursor: Option<ChunkState>,
    ) -> ScheduledChunk<S, A, E, C> {
        ScheduledChunk {
            orchestrator: self.clone(),
            task_id,
            cursor,
        }
    }

    async fn load_owned(&self, user_id: &UserId, task_id: SyncTaskId) -> SyncResult<SyncTask> {
        self.ledger
            .load(task_id)
            .await?
            .filter(|task| task.is_owned_by(user_id))
            .ok_or(SyncError::NotFound(task_id))
    }

    async fn load_any(&self, task_id: SyncTaskId) -> SyncResult<SyncTask> {
        self.ledger
            .load(task_id)
            .await?
            .ok_or(SyncError::NotFound(task_id))
    }

    async fn run_chunk(
        &self,
        task_id: SyncTaskId,
        cursor: Option<ChunkState>,
    ) -> SyncResult<ChunkDisposition> {
        let mut task = self.load_any(task_id).await?;
        match task.status() {
            SyncStatus::Pending => {
                task.start(&*self.clock)?;
                if let Some(status) = discard_on_race(
                    task_id,
                    self.ledger.record(&task, SyncStatus::Pending).await,
                )? {
                    return Ok(ChunkDisposition::Discarded(status));
                }
            }
            SyncStatus::Running => {}
            status => {
                tracing::debug!(%task_id, %status, "chunk skipped; task is not runnable");
                return Ok(ChunkDisposition::Discarded(status));
            }
        }

        let offset = cursor.as_ref().map_or(0, |state| state.offset);
        let accumulated = cursor.map(|state| state.accumulated).unwrap_or_default();
        let outcome = self
            .executor
            .execute_chunk(&ChunkRequest::for_task(&task, offset))
            .await;

        // Cancellation or the reaper may have finished the task meanwhile.
        let mut current = self.load_any(task_id).await?;
        if current.status() != SyncStatus::Running {
            tracing::debug!(
                %task_id,
                status = %current.status(),
                "chunk outcome discarded; task left running"
            );
            return Ok(ChunkDisposition::Discarded(current.status()));
        }

        let progress = current.progress();
        match outcome {
            ChunkOutcome::Continue {
                new_offset,
                items_processed_delta,
                items_total,
                report,
            } => current.pause_at(
                ChunkState::new(new_offset, accumulated.merged(report)),
                progress.advanced(items_processed_delta, Some(items_total)),
                &*self.clock,
            )?,
            ChunkOutcome::Done {
                items_total,
                report,
            } => {
                let delta = report.items_processed;
                current.complete(
                    accumulated.merged(report),
                    progress.advanced(delta, Some(items_total)),
                    &*self.clock,
                )?;
            }
            ChunkOutcome::Fatal { error } => {
                tracing::warn!(%task_id, offset, %error, "chunk reported a fatal error");
                current.fail(error, &*self.clock)?;
            }
        }

        if let Some(status) = discard_on_race(
            task_id,
            self.ledger.record(&current, SyncStatus::Running).await,
        )? {
            return Ok(ChunkDisposition::Discarded(status));
        }
        tracing::info!(
            %task_id,
            status = %current.status(),
            items_processed = current.progress().items_processed(),
            "chunk recorded"
        );
        Ok(ChunkDisposition::Applied(current.status()))
    }
}

/// Maps a lost compare-and-swap to the status that won the race.
fn discard_on_race(
    task_id: SyncTaskId,
    result: Result<(), LedgerError>,
) -> SyncResult<Option<SyncStatus>> {
    let Err(err) = result else {
        return Ok(None);
    };
    let Some(found) = err.lost_race() else {
        return Err(err.into());
    };
    tracing::debug!(%task_id, %found, "chunk outcome discarded; task changed concurrently");
    Ok(Some(found))
}
