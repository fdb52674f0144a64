//! In-memory integration tests for competing requests on one user.

use super::helpers::{Deployment, deployment, listener, seed_favorites};
use crossfade::sync::{
    domain::{SyncStatus, SyncType, UserId},
    services::{ChunkDisposition, StartSyncRequest, SyncConflict, SyncError},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_starts_admit_exactly_one_task(
    deployment: Deployment,
    listener: UserId,
) -> eyre::Result<()> {
    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let orchestrator = deployment.orchestrator.clone();
            let user_id = listener.clone();
            tokio::spawn(async move {
                orchestrator
                    .start_sync(StartSyncRequest::new(user_id, SyncType::favorites()))
                    .await
                    .map(|accepted| accepted.receipt)
            })
        })
        .collect();

    let mut admitted = Vec::new();
    let mut rejected = 0;
    for attempt in attempts {
        match attempt.await? {
            Ok(receipt) => admitted.push(receipt.task_id),
            Err(SyncError::Conflict(SyncConflict::ActiveTaskExists { .. })) => rejected += 1,
            Err(other) => eyre::bail!("unexpected start failure: {other}"),
        }
    }

    eyre::ensure!(admitted.len() == 1, "admitted {admitted:?}");
    eyre::ensure!(rejected == 7);
    let history = deployment.orchestrator.list_history(&listener, None).await?;
    eyre::ensure!(history.len() == 1, "rejected starts must not be recorded");
    let active = deployment
        .orchestrator
        .get_active(&listener)
        .await?
        .ok_or_else(|| eyre::eyre!("the admitted task is active"))?;
    eyre::ensure!(admitted.first() == Some(&active.task_id));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancellation_racing_a_chunk_always_wins(
    deployment: Deployment,
    listener: UserId,
) -> eyre::Result<()> {
    seed_favorites(&deployment, 250)?;
    let accepted = deployment
        .orchestrator
        .start_sync(StartSyncRequest::new(listener.clone(), SyncType::favorites()))
        .await?;
    let task_id = accepted.receipt.task_id;

    let chunk = tokio::spawn(accepted.chunk.run());
    let receipt = deployment
        .orchestrator
        .cancel_sync(&listener, task_id)
        .await?;
    let disposition = chunk.await??;

    eyre::ensure!(receipt.status == SyncStatus::Cancelled);
    eyre::ensure!(
        matches!(
            disposition,
            ChunkDisposition::Applied(SyncStatus::Running | SyncStatus::ChunkComplete)
                | ChunkDisposition::Discarded(SyncStatus::Cancelled)
        ),
        "unexpected disposition {disposition:?}"
    );
    eyre::ensure!(deployment.status_of(&listener, task_id).await? == SyncStatus::Cancelled);
    eyre::ensure!(deployment.orchestrator.get_active(&listener).await?.is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn users_migrate_independently(deployment: Deployment) -> eyre::Result<()> {
    let users: Vec<UserId> = (1..=4)
        .map(|index| UserId::new(format!("listener-{index}")))
        .collect::<Result<_, _>>()?;

    let runs: Vec<_> = users
        .iter()
        .cloned()
        .map(|user_id| {
            let orchestrator = deployment.orchestrator.clone();
            tokio::spawn(async move {
                let accepted = orchestrator
                    .start_sync(StartSyncRequest::new(user_id, SyncType::favorites()))
                    .await?;
                accepted.chunk.run().await
            })
        })
        .collect();

    for run in runs {
        let disposition = run.await??;
        eyre::ensure!(disposition == ChunkDisposition::Applied(SyncStatus::Completed));
    }
    for user_id in &users {
        let history = deployment.orchestrator.list_history(user_id, None).await?;
        eyre::ensure!(history.len() == 1);
    }
    Ok(())
}
