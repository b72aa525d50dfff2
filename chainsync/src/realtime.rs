//! Keeps a job current with new blocks through an installed log filter on
//! the node, persisting each delivered log with the `realtime_block` cursor
//! in one transaction. Runs until cancelled, then releases the filter.

use std::slice;
use std::time::Duration;

use ethers::types::{Log, U256};
use tokio::time::interval;

use crate::cancellation::CancelFlag;
use crate::jobs::SyncJob;
use crate::provider::{ChainProvider, ProviderSource};
use crate::repos::{ExecutesWithRawQuery, HasRawQueryClient};
use crate::retry::{with_retry, RetryPolicy};
use crate::{ChainsyncRepo, ChainsyncRepoClient, SyncError};

pub async fn sync<S: ProviderSource>(
    job: &SyncJob,
    source: &S,
    repo: &ChainsyncRepo,
    retry_policy: &RetryPolicy,
    poll_interval_ms: u64,
    cancel: &CancelFlag,
) -> Result<(), SyncError> {
    let mut client = repo.get_client().await?;

    let subscription_filter = job.filter.clone();
    let filter_id = with_retry(source, retry_policy, cancel, move |provider| {
        let filter = subscription_filter.clone();

        async move { provider.install_log_filter(&filter).await }
    })
    .await?;

    tracing::info!(
        event_table = %job.event_table,
        %filter_id,
        "subscribed to realtime events"
    );

    let mut poll = interval(Duration::from_millis(poll_interval_ms));

    while !cancel.is_cancelled() {
        poll.tick().await;

        let delivered = match with_retry(source, retry_policy, cancel, move |provider| async move {
            provider.poll_log_filter(filter_id).await
        })
        .await
        {
            Ok(delivered) => delivered,
            Err(provider_error) => {
                release_subscription(source, job, filter_id).await;

                return Err(provider_error.into());
            }
        };

        for log in &delivered {
            if let Err(error) = persist_delivered(&mut client, job, log).await {
                // A dropped delivery is not fatal here: the historical pass
                // re-covers the block on the next restart.
                tracing::error!(
                    event_table = %job.event_table,
                    %error,
                    "failed to persist delivered log"
                );
            }
        }
    }

    release_subscription(source, job, filter_id).await;

    Ok(())
}

async fn persist_delivered(
    client: &mut ChainsyncRepoClient,
    job: &SyncJob,
    log: &Log,
) -> Result<(), SyncError> {
    let block_number = log.block_number.ok_or_else(|| SyncError::Decode {
        event_table: job.event_table.clone(),
        error: crate::events::DecodeError("delivered log has no block number".to_string()),
    })?;

    let txn_client = ChainsyncRepo::get_txn_client(client).await?;
    job.sink
        .persist(
            &txn_client,
            &job.event_table,
            slice::from_ref(log),
            job.decode_policy,
        )
        .await?;
    ChainsyncRepo::update_realtime_block(&txn_client, &job.event_table, block_number.as_u64() as i64)
        .await?;
    ChainsyncRepo::commit_txn(txn_client).await?;

    Ok(())
}

async fn release_subscription<S: ProviderSource>(
    source: &S,
    job: &SyncJob,
    filter_id: U256,
) {
    let provider = source.get().await;

    if let Err(provider_error) = provider.uninstall_log_filter(filter_id).await {
        tracing::warn!(
            event_table = %job.event_table,
            %filter_id,
            error = %provider_error,
            "failed to uninstall log filter"
        );
    }
}
