//! Unit tests for the sync module.
//!
//! Tests are organised by component: the status table and task aggregate,
//! the library chunk executor, the dual-write ledger, the orchestrator,
//! migration roll-ups and the stale task reaper.
