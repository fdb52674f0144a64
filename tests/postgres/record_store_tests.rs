//! `PostgreSQL` record store tests.

use super::cluster::shared_cluster;
use super::helpers::{BoxError, pending_task, prepared_store};
use chrono::TimeDelta;
use crossfade::sync::{
    domain::{
        ChunkState, MigrationId, NewSyncTask, SyncProgress, SyncReport, SyncStatus, SyncTask,
        SyncType, UserId,
    },
    ports::{TaskRecordStore, TaskStoreError},
};
use diesel::dsl::IntoSql;
use diesel::prelude::*;
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn created_task_round_trips() -> Result<(), BoxError> {
    let prepared = prepared_store().await?;
    let task = pending_task(&prepared.clock, "listener-1", Some(MigrationId::new()))?;

    prepared.store.create(&task).await?;
    let found = prepared.store.find_by_id(task.id()).await?;

    assert_eq!(found, Some(task));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn playlist_selection_round_trips() -> Result<(), BoxError> {
    let prepared = prepared_store().await?;
    let task = SyncTask::new(
        NewSyncTask {
            user_id: UserId::new("listener-1")?,
            sync_type: SyncType::playlists(),
            dry_run: true,
            migration_id: None,
            playlists: vec!["Road Trip".to_owned(), "Chill".to_owned()],
        },
        &prepared.clock,
    );

    prepared.store.create(&task).await?;
    let found = prepared
        .store
        .find_by_id(task.id())
        .await?
        .ok_or("task must be stored")?;

    assert_eq!(found.playlists(), ["Chill".to_owned(), "Road Trip".to_owned()]);
    assert_eq!(found, task);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_identifier_is_rejected() -> Result<(), BoxError> {
    let prepared = prepared_store().await?;
    let task = pending_task(&prepared.clock, "listener-1", None)?;
    prepared.store.create(&task).await?;

    let result = prepared.store.create(&task).await;

    assert!(matches!(result, Err(TaskStoreError::DuplicateTask(id)) if id == task.id()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn update_persists_cursor_and_progress() -> Result<(), BoxError> {
    let prepared = prepared_store().await?;
    let clock = &prepared.clock;
    let mut task = pending_task(clock, "listener-1", None)?;
    prepared.store.create(&task).await?;

    task.start(clock)?;
    prepared.store.update(&task, SyncStatus::Pending).await?;
    clock.advance(TimeDelta::seconds(30));
    let report = SyncReport {
        items_processed: 100,
        items_added: 100,
        ..SyncReport::default()
    };
    task.pause_at(
        ChunkState::new(100, report),
        SyncProgress::new(100, Some(250)),
        clock,
    )?;
    prepared.store.update(&task, SyncStatus::Running).await?;

    let found = prepared
        .store
        .find_by_id(task.id())
        .await?
        .ok_or("task should exist")?;
    assert_eq!(found.status(), SyncStatus::ChunkComplete);
    assert_eq!(found.chunk_state().map(|cursor| cursor.offset), Some(100));
    assert_eq!(found.progress(), SyncProgress::new(100, Some(250)));
    assert_eq!(found, task);

    task.resume(clock)?;
    prepared.store.update(&task, SyncStatus::ChunkComplete).await?;
    let resumed = prepared
        .store
        .find_by_id(task.id())
        .await?
        .ok_or("task should exist")?;
    assert!(resumed.chunk_state().is_none(), "cursor is cleared on resume");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn update_with_stale_status_conflicts() -> Result<(), BoxError> {
    let prepared = prepared_store().await?;
    let clock = &prepared.clock;
    let mut task = pending_task(clock, "listener-1", None)?;
    prepared.store.create(&task).await?;
    task.cancel(clock)?;
    prepared.store.update(&task, SyncStatus::Pending).await?;

    let unknown = pending_task(clock, "listener-1", None)?;
    let missing = prepared.store.update(&unknown, SyncStatus::Pending).await;
    assert!(matches!(missing, Err(TaskStoreError::NotFound(id)) if id == unknown.id()));

    let lost_race = prepared.store.update(&task, SyncStatus::Running).await;
    assert!(matches!(
        lost_race,
        Err(TaskStoreError::Conflict {
            expected: SyncStatus::Running,
            found: SyncStatus::Cancelled,
            ..
        })
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn history_is_newest_first_and_limited() -> Result<(), BoxError> {
    let prepared = prepared_store().await?;
    let clock = &prepared.clock;
    let mut created = Vec::new();
    for _ in 0..3 {
        let mut task = pending_task(clock, "listener-1", None)?;
        task.cancel(clock)?;
        prepared.store.create(&task).await?;
        created.push(task.id());
        clock.advance(TimeDelta::minutes(1));
    }
    prepared
        .store
        .create(&pending_task(clock, "listener-2", None)?)
        .await?;

    let history = prepared
        .store
        .list_for_user(&UserId::new("listener-1")?, 2)
        .await?;

    let ids: Vec<_> = history.iter().map(|task| task.id()).collect();
    let expected: Vec<_> = created.iter().rev().take(2).copied().collect();
    assert_eq!(ids, expected);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unfinished_tasks_exclude_terminal_ones() -> Result<(), BoxError> {
    let prepared = prepared_store().await?;
    let clock = &prepared.clock;
    let mut finished = pending_task(clock, "listener-1", None)?;
    finished.fail("boom", clock)?;
    prepared.store.create(&finished).await?;
    let pending = pending_task(clock, "listener-2", None)?;
    prepared.store.create(&pending).await?;
    clock.advance(TimeDelta::seconds(5));
    let mut running = pending_task(clock, "listener-3", None)?;
    running.start(clock)?;
    prepared.store.create(&running).await?;

    let unfinished = prepared.store.list_unfinished().await?;

    let ids: Vec<_> = unfinished.iter().map(|task| task.id()).collect();
    assert_eq!(ids, vec![pending.id(), running.id()]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn migration_listing_is_scoped_to_user_and_run() -> Result<(), BoxError> {
    let prepared = prepared_store().await?;
    let clock = &prepared.clock;
    let migration = MigrationId::new();
    let first = pending_task(clock, "listener-1", Some(migration))?;
    prepared.store.create(&first).await?;
    clock.advance(TimeDelta::seconds(1));
    let second = pending_task(clock, "listener-1", Some(migration))?;
    prepared.store.create(&second).await?;
    prepared
        .store
        .create(&pending_task(clock, "listener-1", Some(MigrationId::new()))?)
        .await?;
    prepared
        .store
        .create(&pending_task(clock, "listener-2", Some(migration))?)
        .await?;

    let tasks = prepared
        .store
        .list_for_migration(&UserId::new("listener-1")?, migration)
        .await?;

    let ids: Vec<_> = tasks.iter().map(|task| task.id()).collect();
    assert_eq!(ids, vec![first.id(), second.id()]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn embedded_cluster_accepts_connections() -> Result<(), BoxError> {
    let url = shared_cluster().await?.database_url("postgres");

    let answer = tokio::task::spawn_blocking(move || -> Result<i32, BoxError> {
        let mut connection = PgConnection::establish(&url)?;
        let row = diesel::select(1.into_sql::<diesel::sql_types::Integer>())
            .get_result::<i32>(&mut connection)?;
        Ok(row)
    })
    .await??;

    assert_eq!(answer, 1);
    Ok(())
}
