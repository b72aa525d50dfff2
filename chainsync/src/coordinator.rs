use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::sleep;

use crate::cancellation::CancelFlag;
use crate::checkpoints::UnsavedCheckpoint;
use crate::config::{Config, FailurePolicy};
use crate::hashes::h160_to_string;
use crate::jobs::SyncJob;
use crate::provider::ProviderSource;
use crate::repos::{HasRawQueryClient, Migratable, Repo, RepoMigrations};
use crate::retry::RetryPolicy;
use crate::{historical, realtime, ChainsyncRepo, SyncError};

#[derive(Clone)]
struct JobSettings {
    retry_policy: RetryPolicy,
    blocks_per_window: u64,
    realtime_poll_ms: u64,
    job_restart_delay_ms: u64,
    failure_policy: FailurePolicy,
}

pub(crate) async fn run<S: ProviderSource + 'static>(
    config: Config<S>,
    cancel: CancelFlag,
) -> Result<(), SyncError> {
    config.validate()?;
    setup(&config).await?;

    let settings = JobSettings {
        retry_policy: config.retry_policy,
        blocks_per_window: config.blocks_per_window,
        realtime_poll_ms: config.realtime_poll_ms,
        job_restart_delay_ms: config.job_restart_delay_ms,
        failure_policy: config.failure_policy,
    };

    let Config {
        repo,
        provider_source,
        jobs,
        ..
    } = config;

    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            tokio::spawn(supervise(
                Arc::new(job),
                provider_source.clone(),
                repo.clone(),
                settings.clone(),
                cancel.clone(),
            ))
        })
        .collect();

    let mut first_error = None;

    for outcome in join_all(handles).await {
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(sync_error)) => {
                first_error.get_or_insert(sync_error);
            }
            Err(join_error) => {
                cancel.cancel();
                first_error.get_or_insert(SyncError::JobPanicked(join_error.to_string()));
            }
        }
    }

    match first_error {
        None => Ok(()),
        Some(sync_error) => Err(sync_error),
    }
}

async fn setup<S: ProviderSource>(config: &Config<S>) -> Result<(), SyncError> {
    let client = config.repo.get_client().await?;
    ChainsyncRepo::migrate(&client, ChainsyncRepo::get_internal_migrations()).await?;

    let pool = config.repo.get_pool(1).await?;
    let mut conn = ChainsyncRepo::get_conn(&pool).await?;

    let checkpoints: Vec<_> = config
        .jobs
        .iter()
        .map(|job| UnsavedCheckpoint::new(&job.event_table))
        .collect();
    ChainsyncRepo::create_checkpoints(&mut conn, &checkpoints).await?;

    for checkpoint in ChainsyncRepo::get_checkpoints(&mut conn).await? {
        if config.jobs.iter().any(|job| job.event_table == checkpoint.event_table) {
            tracing::info!(
                event_table = %checkpoint.event_table,
                historical_block = ?checkpoint.historical_block,
                realtime_block = ?checkpoint.realtime_block,
                "resuming from sync checkpoint"
            );
        }
    }

    Ok(())
}

async fn supervise<S: ProviderSource>(
    job: Arc<SyncJob>,
    source: Arc<S>,
    repo: ChainsyncRepo,
    settings: JobSettings,
    cancel: CancelFlag,
) -> Result<(), SyncError> {
    tracing::info!(
        event_table = %job.event_table,
        contract_address = %h160_to_string(&job.contract_address),
        "syncing contract events"
    );

    let mut last_error: Option<SyncError> = None;

    loop {
        // Both passes share a per-cycle flag: either one failing cancels
        // the other, which then exits through its normal shutdown path.
        // The realtime pass in particular must get to uninstall its log
        // filter, or each restart would orphan one on the node.
        let cycle_cancel = cancel.child();

        let historical = async {
            let result = historical::sync(
                &job,
                source.as_ref(),
                &repo,
                &settings.retry_policy,
                settings.blocks_per_window,
                &cycle_cancel,
            )
            .await;

            if result.is_err() {
                cycle_cancel.cancel();
            }

            result
        };
        let realtime = async {
            let result = realtime::sync(
                &job,
                source.as_ref(),
                &repo,
                &settings.retry_policy,
                settings.realtime_poll_ms,
                &cycle_cancel,
            )
            .await;

            if result.is_err() {
                cycle_cancel.cancel();
            }

            result
        };

        let (historical_result, realtime_result) = tokio::join!(historical, realtime);

        match historical_result.and(realtime_result) {
            // A clean cycle only ends through cancellation; a job that
            // failed in earlier cycles still surfaces its last error.
            Ok(()) => return last_error.map_or(Ok(()), Err),
            Err(sync_error) => {
                if cancel.is_cancelled() {
                    return Err(sync_error);
                }

                match settings.failure_policy {
                    FailurePolicy::StopAll => {
                        tracing::error!(
                            event_table = %job.event_table,
                            error = %sync_error,
                            "sync job failed, stopping all jobs"
                        );
                        cancel.cancel();

                        return Err(sync_error);
                    }
                    FailurePolicy::RestartJob => {
                        tracing::error!(
                            event_table = %job.event_table,
                            error = %sync_error,
                            "sync job failed, restarting"
                        );
                        last_error = Some(sync_error);

                        sleep(Duration::from_millis(settings.job_restart_delay_ms)).await;
                    }
                }
            }
        }
    }
}
