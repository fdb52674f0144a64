//! Step definitions for sync task lifecycle scenarios.

pub mod world;

mod when;
