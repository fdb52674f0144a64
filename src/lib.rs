//! Crossfade: library migration between streaming-service accounts.
//!
//! This crate provides the sync task engine that moves favorites and
//! playlists from one account to another in resumable, cancellable chunks.
//!
//! # Architecture
//!
//! Crossfade follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for storage and streaming services
//! - **Adapters**: Concrete implementations of ports (in-memory, `PostgreSQL`)
//! - **Services**: Task orchestration, dual-write ledger and stale task reaping
//!
//! # Modules
//!
//! - [`config`]: Engine tunables from JSON payloads and the environment
//! - [`sync`]: Sync task lifecycle, chunk execution and status reads

pub mod config;
pub mod sync;
