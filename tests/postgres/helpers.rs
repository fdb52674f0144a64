//! Shared test helpers for `PostgreSQL` integration tests.

use super::cluster::shared_cluster;
use super::super::test_helpers::ManualClock;
use crossfade::sync::{
    adapters::postgres::PostgresTaskRecordStore,
    domain::{MigrationId, NewSyncTask, SyncTask, SyncType, UserId},
};
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use uuid::Uuid;

/// Boxed error used by fixture setup.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Names an existing database to use instead of the embedded cluster.
pub const DATABASE_URL_ENV: &str = "CROSSFADE_TEST_DATABASE_URL";

/// SQL creating the sync task table.
pub const CREATE_SYNC_TASKS_SQL: &str =
    include_str!("../../migrations/2026-10-19-000000_create_sync_tasks/up.sql");

/// Pins every pooled connection to the test schema.
#[derive(Debug)]
struct SearchPath(String);

impl CustomizeConnection<PgConnection, diesel::r2d2::Error> for SearchPath {
    fn on_acquire(&self, connection: &mut PgConnection) -> Result<(), diesel::r2d2::Error> {
        connection
            .batch_execute(&format!("SET search_path TO {}", self.0))
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Record store bound to a throwaway schema that is dropped with it.
pub struct PreparedStore {
    /// Store under test.
    pub store: PostgresTaskRecordStore,
    /// Clock for building tasks with whole-second timestamps.
    pub clock: ManualClock,
    url: String,
    schema: String,
}

impl Drop for PreparedStore {
    fn drop(&mut self) {
        if let Ok(mut connection) = PgConnection::establish(&self.url) {
            drop(connection.batch_execute(&format!(
                "DROP SCHEMA IF EXISTS {} CASCADE",
                self.schema
            )));
        }
    }
}

/// Creates a schema with the sync task table and a store using it.
///
/// The schema lives in the database named by [`DATABASE_URL_ENV`] when it is
/// set, and in the shared embedded cluster otherwise.
///
/// # Errors
///
/// Returns an error if the cluster cannot start, or if connecting,
/// migrating, or building the pool fails.
pub async fn prepared_store() -> Result<PreparedStore, BoxError> {
    let url = match std::env::var(DATABASE_URL_ENV) {
        Ok(url) => url,
        Err(_) => shared_cluster().await?.database_url("postgres"),
    };
    let schema = format!("crossfade_test_{}", Uuid::new_v4().simple());

    let setup_url = url.clone();
    let setup_schema = schema.clone();
    tokio::task::spawn_blocking(move || -> Result<(), BoxError> {
        let mut connection = PgConnection::establish(&setup_url)?;
        connection.batch_execute(&format!(
            "CREATE SCHEMA {setup_schema}; SET search_path TO {setup_schema};"
        ))?;
        connection.batch_execute(CREATE_SYNC_TASKS_SQL)?;
        Ok(())
    })
    .await??;

    let pool = Pool::builder()
        .max_size(2)
        .connection_customizer(Box::new(SearchPath(schema.clone())))
        .build(ConnectionManager::<PgConnection>::new(url.as_str()))?;

    Ok(PreparedStore {
        store: PostgresTaskRecordStore::new(pool),
        clock: ManualClock::new(),
        url,
        schema,
    })
}

/// Builds a pending favorites task for `user`.
///
/// # Errors
///
/// Returns an error if `user` is not a valid user identifier.
pub fn pending_task(
    clock: &ManualClock,
    user: &str,
    migration_id: Option<MigrationId>,
) -> Result<SyncTask, BoxError> {
    Ok(SyncTask::new(
        NewSyncTask {
            user_id: UserId::new(user)?,
            sync_type: SyncType::favorites(),
            dry_run: false,
            migration_id,
            playlists: Vec::new(),
        },
        clock,
    ))
}
