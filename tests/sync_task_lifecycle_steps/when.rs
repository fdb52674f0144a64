//! When steps for sync task lifecycle BDD scenarios.

use super::world::{SyncWorld, run_async};
use chrono::TimeDelta;
use crossfade::sync::{domain::SyncType, services::StartSyncRequest};
use rstest_bdd_macros::when;

#[when(r#"the user starts a "{kind}" sync"#)]
fn user_starts_sync(world: &mut SyncWorld, kind: String) -> Result<(), eyre::Report> {
    let sync_type = SyncType::try_from(kind.as_str())?;
    let user = world.user()?.clone();
    match run_async(
        world
            .orchestrator
            .start_sync(StartSyncRequest::new(user, sync_type)),
    ) {
        Ok(accepted) => {
            world.task_id = Some(accepted.receipt.task_id);
            world.pending_chunk = Some(accepted.chunk);
        }
        Err(err) => world.last_error = Some(err),
    }
    Ok(())
}

#[when("the scheduled chunk runs")]
fn scheduled_chunk_runs(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    let chunk = world
        .pending_chunk
        .take()
        .ok_or_else(|| eyre::eyre!("no chunk is scheduled"))?;
    run_async(chunk.run())?;
    Ok(())
}

#[when("the user continues the task")]
fn user_continues_task(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    let user = world.user()?.clone();
    let task_id = world.task_id()?;
    match run_async(world.orchestrator.continue_sync(&user, task_id)) {
        Ok(accepted) => world.pending_chunk = Some(accepted.chunk),
        Err(err) => world.last_error = Some(err),
    }
    Ok(())
}

#[when("the user cancels the task")]
fn user_cancels_task(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    let user = world.user()?.clone();
    let task_id = world.task_id()?;
    run_async(world.orchestrator.cancel_sync(&user, task_id))?;
    Ok(())
}

#[when("{minutes:i64} minutes pass without progress")]
fn minutes_pass(world: &mut SyncWorld, minutes: i64) {
    world.clock.advance(TimeDelta::minutes(minutes));
}

#[when("the user asks for the active task")]
fn user_asks_for_active_task(world: &mut SyncWorld) -> Result<(), eyre::Report> {
    let user = world.user()?.clone();
    world.active = Some(run_async(world.orchestrator.get_active(&user))?);
    Ok(())
}
