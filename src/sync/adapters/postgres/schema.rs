//! Diesel schema for sync task persistence.

diesel::table! {
    /// Durable sync task history.
    sync_tasks (id) {
        /// Task identifier.
        id -> Uuid,
        /// Owning user.
        #[max_length = 255]
        user_id -> Varchar,
        /// Optional migration run link.
        migration_id -> Nullable<Uuid>,
        /// Canonical `kind:direction` sync type.
        #[max_length = 50]
        sync_type -> Varchar,
        /// Dry-run flag.
        dry_run -> Bool,
        /// Selected source playlist names as a JSON array.
        playlist_selection -> Jsonb,
        /// Lifecycle status.
        #[max_length = 50]
        status -> Varchar,
        /// Progress payload.
        progress -> Jsonb,
        /// Resume cursor, set only while paused at a chunk boundary.
        chunk_state -> Nullable<Jsonb>,
        /// Completion report.
        report -> Nullable<Jsonb>,
        /// Failure description.
        error -> Nullable<Text>,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}
