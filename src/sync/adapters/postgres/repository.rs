//! `PostgreSQL` record store implementation for sync task history.

use super::{
    models::{NewSyncTaskRow, SyncTaskChangeset, SyncTaskRow},
    schema::sync_tasks,
};
use crate::sync::{
    domain::{
        ChunkState, MigrationId, PersistedSyncTaskData, SyncProgress, SyncReport, SyncStatus,
        SyncTask, SyncTaskId, SyncType, UserId,
    },
    ports::{TaskRecordStore, TaskStoreError, TaskStoreResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// `PostgreSQL` connection pool type used by sync adapters.
pub type SyncPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed task record store.
#[derive(Debug, Clone)]
pub struct PostgresTaskRecordStore {
    pool: SyncPgPool,
}

impl PostgresTaskRecordStore {
    /// Creates a new store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: SyncPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskStoreError::persistence)?
    }
}

#[async_trait]
impl TaskRecordStore for PostgresTaskRecordStore {
    async fn create(&self, task: &SyncTask) -> TaskStoreResult<()> {
        let task_id = task.id();
        let new_row = to_new_row(task)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(sync_tasks::table)
                .values(&new_row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TaskStoreError::DuplicateTask(task_id)
                    }
                    _ => TaskStoreError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: SyncTaskId) -> TaskStoreResult<Option<SyncTask>> {
        self.run_blocking(move |connection| {
            let row = find_row(connection, id)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn update(&self, task: &SyncTask, expected: SyncStatus) -> TaskStoreResult<()> {
        let task_id = task.id();
        let changeset = to_changeset(task)?;

        self.run_blocking(move |connection| {
            let updated = diesel::update(
                sync_tasks::table
                    .filter(sync_tasks::id.eq(task_id.into_inner()))
                    .filter(sync_tasks::status.eq(expected.as_str())),
            )
            .set(&changeset)
            .execute(connection)
            .map_err(TaskStoreError::persistence)?;

            if updated == 1 {
                return Ok(());
            }

            // Zero rows: distinguish a missing task from a lost status race.
            let current = find_row(connection, task_id)?.ok_or(TaskStoreError::NotFound(task_id))?;
            let found =
                SyncStatus::try_from(current.status.as_str()).map_err(TaskStoreError::persistence)?;
            Err(TaskStoreError::Conflict {
                task_id,
                expected,
                found,
            })
        })
        .await
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> TaskStoreResult<Vec<SyncTask>> {
        let owner = user_id.as_str().to_owned();
        let row_limit = i64::try_from(limit).map_err(TaskStoreError::persistence)?;

        self.run_blocking(move |connection| {
            let rows = sync_tasks::table
                .filter(sync_tasks::user_id.eq(owner))
                .order((sync_tasks::created_at.desc(), sync_tasks::id.desc()))
                .limit(row_limit)
                .select(SyncTaskRow::as_select())
                .load::<SyncTaskRow>(connection)
                .map_err(TaskStoreError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn list_unfinished(&self) -> TaskStoreResult<Vec<SyncTask>> {
        let unfinished: Vec<&'static str> = SyncStatus::ALL
            .into_iter()
            .filter(|status| status.is_active())
            .map(SyncStatus::as_str)
            .collect();

        self.run_blocking(move |connection| {
            let rows = sync_tasks::table
                .filter(sync_tasks::status.eq_any(unfinished))
                .order(sync_tasks::updated_at.asc())
                .select(SyncTaskRow::as_select())
                .load::<SyncTaskRow>(connection)
                .map_err(TaskStoreError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn list_for_migration(
        &self,
        user_id: &UserId,
        migration_id: MigrationId,
    ) -> TaskStoreResult<Vec<SyncTask>> {
        let owner = user_id.as_str().to_owned();

        self.run_blocking(move |connection| {
            let rows = sync_tasks::table
                .filter(sync_tasks::user_id.eq(owner))
                .filter(sync_tasks::migration_id.eq(migration_id.into_inner()))
                .order(sync_tasks::created_at.asc())
                .select(SyncTaskRow::as_select())
                .load::<SyncTaskRow>(connection)
                .map_err(TaskStoreError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }
}

fn find_row(connection: &mut PgConnection, id: SyncTaskId) -> TaskStoreResult<Option<SyncTaskRow>> {
    sync_tasks::table
        .filter(sync_tasks::id.eq(id.into_inner()))
        .select(SyncTaskRow::as_select())
        .first::<SyncTaskRow>(connection)
        .optional()
        .map_err(TaskStoreError::persistence)
}

fn to_json<T: Serialize>(value: &T) -> TaskStoreResult<Value> {
    serde_json::to_value(value).map_err(TaskStoreError::persistence)
}

fn to_optional_json<T: Serialize>(value: Option<&T>) -> TaskStoreResult<Option<Value>> {
    value.map(to_json).transpose()
}

fn from_json<T: DeserializeOwned>(value: Value) -> TaskStoreResult<T> {
    serde_json::from_value(value).map_err(TaskStoreError::persistence)
}

fn from_optional_json<T: DeserializeOwned>(value: Option<Value>) -> TaskStoreResult<Option<T>> {
    value.map(from_json).transpose()
}

fn to_new_row(task: &SyncTask) -> TaskStoreResult<NewSyncTaskRow> {
    Ok(NewSyncTaskRow {
        id: task.id().into_inner(),
        user_id: task.user_id().as_str().to_owned(),
        migration_id: task.migration_id().map(MigrationId::into_inner),
        sync_type: task.sync_type().as_str().to_owned(),
        dry_run: task.dry_run(),
        playlist_selection: to_json(&task.playlists())?,
        status: task.status().as_str().to_owned(),
        progress: to_json(&task.progress())?,
        chunk_state: to_optional_json(task.chunk_state())?,
        report: to_optional_json(task.report())?,
        error: task.error().map(str::to_owned),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

fn to_changeset(task: &SyncTask) -> TaskStoreResult<SyncTaskChangeset> {
    Ok(SyncTaskChangeset {
        status: task.status().as_str().to_owned(),
        progress: to_json(&task.progress())?,
        chunk_state: to_optional_json(task.chunk_state())?,
        report: to_optional_json(task.report())?,
        error: task.error().map(str::to_owned),
        updated_at: task.updated_at(),
    })
}

fn row_to_task(row: SyncTaskRow) -> TaskStoreResult<SyncTask> {
    let SyncTaskRow {
        id,
        user_id,
        migration_id,
        sync_type,
        dry_run,
        playlist_selection,
        status,
        progress,
        chunk_state,
        report,
        error,
        created_at,
        updated_at,
    } = row;

    let data = PersistedSyncTaskData {
        id: SyncTaskId::from_uuid(id),
        user_id: UserId::new(user_id).map_err(TaskStoreError::persistence)?,
        sync_type: SyncType::try_from(sync_type.as_str()).map_err(TaskStoreError::persistence)?,
        dry_run,
        migration_id: migration_id.map(MigrationId::from_uuid),
        playlists: from_json::<Vec<String>>(playlist_selection)?,
        status: SyncStatus::try_from(status.as_str()).map_err(TaskStoreError::persistence)?,
        progress: from_json::<SyncProgress>(progress)?,
        chunk_state: from_optional_json::<ChunkState>(chunk_state)?,
        report: from_optional_json::<SyncReport>(report)?,
        error,
        created_at,
        updated_at,
    };
    Ok(SyncTask::from_persisted(data))
}
