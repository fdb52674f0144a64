//! Sync task orchestration for library migrations.
//!
//! A sync task copies one category of a user's library (favorites or
//! playlists) from one streaming-service account to the other. Work runs in
//! bounded chunks outside the request that started it; the task pauses at
//! each chunk boundary until the client continues it, and every status
//! change is written to the active task cache and then to the durable
//! record store. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
