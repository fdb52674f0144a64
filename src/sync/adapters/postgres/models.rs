//! Diesel row models for sync task persistence.

use super::schema::sync_tasks;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result row for sync task records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = sync_tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SyncTaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Owning user.
    pub user_id: String,
    /// Optional migration run link.
    pub migration_id: Option<uuid::Uuid>,
    /// Canonical sync type.
    pub sync_type: String,
    /// Dry-run flag.
    pub dry_run: bool,
    /// Selected source playlists; empty selects all.
    pub playlist_selection: Value,
    /// Lifecycle status.
    pub status: String,
    /// Progress payload.
    pub progress: Value,
    /// Resume cursor payload.
    pub chunk_state: Option<Value>,
    /// Report payload.
    pub report: Option<Value>,
    /// Failure description.
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Insert model for sync task records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = sync_tasks)]
pub struct NewSyncTaskRow {
    /// Task identifier.
    pub id: uuid::Uuid,
    /// Owning user.
    pub user_id: String,
    /// Optional migration run link.
    pub migration_id: Option<uuid::Uuid>,
    /// Canonical sync type.
    pub sync_type: String,
    /// Dry-run flag.
    pub dry_run: bool,
    /// Selected source playlists; empty selects all.
    pub playlist_selection: Value,
    /// Lifecycle status.
    pub status: String,
    /// Progress payload.
    pub progress: Value,
    /// Resume cursor payload.
    pub chunk_state: Option<Value>,
    /// Report payload.
    pub report: Option<Value>,
    /// Failure description.
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Changeset applied on status transitions. `None` fields are written as
/// `NULL`.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = sync_tasks)]
#[diesel(treat_none_as_null = true)]
pub struct SyncTaskChangeset {
    /// New lifecycle status.
    pub status: String,
    /// New progress payload.
    pub progress: Value,
    /// New resume cursor payload.
    pub chunk_state: Option<Value>,
    /// New report payload.
    pub report: Option<Value>,
    /// New failure description.
    pub error: Option<String>,
    /// New update timestamp.
    pub updated_at: DateTime<Utc>,
}
