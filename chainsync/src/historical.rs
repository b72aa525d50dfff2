//! Backfills a job's events from its contract's deploy block to the chain
//! head, one block window per transaction. Each committed transaction holds
//! both the window's records and the advanced `historical_block` cursor, so
//! a crash mid-backfill resumes at the last committed window.

use std::cmp::min;

use crate::cancellation::CancelFlag;
use crate::jobs::SyncJob;
use crate::provider::{ChainProvider, ProviderSource};
use crate::repos::{ExecutesWithRawQuery, HasRawQueryClient, LoadsDataWithRawQuery};
use crate::retry::{with_retry, RetryPolicy};
use crate::{ChainsyncRepo, SyncError};

pub async fn sync<S: ProviderSource>(
    job: &SyncJob,
    source: &S,
    repo: &ChainsyncRepo,
    retry_policy: &RetryPolicy,
    blocks_per_window: u64,
    cancel: &CancelFlag,
) -> Result<(), SyncError> {
    let mut client = repo.get_client().await?;

    let deploy_block = resolve_deploy_block(job, source, retry_policy, cancel).await?;
    let head_snapshot = with_retry(source, retry_policy, cancel, |provider| async move {
        provider.get_block_number().await
    })
    .await?
    .as_u64();

    let checkpoint = ChainsyncRepo::load_checkpoint(&client, &job.event_table).await?;
    let mut from = checkpoint
        .and_then(|checkpoint| checkpoint.historical_block)
        .map_or(deploy_block, |block| (block as u64).max(deploy_block));

    tracing::info!(
        event_table = %job.event_table,
        from,
        head_snapshot,
        "backfilling historical events"
    );

    while from < head_snapshot && !cancel.is_cancelled() {
        let to = min(from + blocks_per_window, head_snapshot);

        // Windows are half-open [from, to); the node's range query is
        // inclusive on both ends.
        let window_filter = job.filter.clone().from_block(from).to_block(to - 1);
        let logs = with_retry(source, retry_policy, cancel, move |provider| {
            let filter = window_filter.clone();

            async move { provider.get_logs(&filter).await }
        })
        .await?;

        let txn_client = ChainsyncRepo::get_txn_client(&mut client).await?;
        job.sink
            .persist(&txn_client, &job.event_table, &logs, job.decode_policy)
            .await?;
        ChainsyncRepo::update_historical_block(&txn_client, &job.event_table, to as i64).await?;
        ChainsyncRepo::commit_txn(txn_client).await?;

        tracing::debug!(
            event_table = %job.event_table,
            from,
            to,
            logs = logs.len(),
            "committed block window"
        );

        from = to;
    }

    Ok(())
}

/// The backfill's lower bound is the block the contract's deploy
/// transaction was mined in.
async fn resolve_deploy_block<S: ProviderSource>(
    job: &SyncJob,
    source: &S,
    retry_policy: &RetryPolicy,
    cancel: &CancelFlag,
) -> Result<u64, SyncError> {
    let deploy_tx_hash = job.deploy_tx_hash;
    let transaction = with_retry(source, retry_policy, cancel, move |provider| async move {
        provider.get_transaction(deploy_tx_hash).await
    })
    .await?;

    transaction
        .and_then(|transaction| transaction.block_number)
        .map(|block| block.as_u64())
        .ok_or_else(|| SyncError::UnresolvedDeployBlock {
            tx_hash: crate::hashes::h256_to_string(&job.deploy_tx_hash),
        })
}
