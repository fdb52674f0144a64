//! `PostgreSQL` adapters for durable sync task history.

mod models;
mod repository;
mod schema;

pub use repository::{PostgresTaskRecordStore, SyncPgPool};
