#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chainsync::{realtime, CancelFlag, DecodePolicy, RetryPolicy, SyncError, SyncJob};
    use tokio::time::sleep;

    use crate::factory::{
        create_transfers_table, malformed_log, test_event_table, transfer_job, transfer_log,
        FakeChain, FakeChainSource, TEST_CONTRACT_ADDRESS,
    };
    use crate::{count_rows, get_checkpoint, register_checkpoint, test_runner};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    fn spawn_sync(
        job: SyncJob,
        chain: FakeChain,
        repo: chainsync::ChainsyncRepo,
        cancel: CancelFlag,
    ) -> tokio::task::JoinHandle<Result<(), SyncError>> {
        tokio::spawn(async move {
            let source = FakeChainSource::new(chain);

            realtime::sync(&job, &source, &repo, &fast_retry(), 10, &cancel).await
        })
    }

    #[tokio::test]
    pub async fn persists_delivered_logs_with_realtime_cursor() {
        test_runner::run_test(|repo, client| async move {
            let event_table = test_event_table("realtime_delivery");
            create_transfers_table(&client, &event_table).await;
            register_checkpoint(&client, &event_table).await;

            let chain = FakeChain::new(250);
            let cancel = CancelFlag::new();
            let handle = spawn_sync(
                transfer_job(&event_table),
                chain.clone(),
                repo.clone(),
                cancel.clone(),
            );

            sleep(Duration::from_millis(100)).await;
            chain.deliver(transfer_log(TEST_CONTRACT_ADDRESS, 261, 1));
            sleep(Duration::from_millis(200)).await;

            cancel.cancel();
            handle.await.unwrap().unwrap();

            assert_eq!(count_rows(&client, &event_table).await, 1);

            let checkpoint = get_checkpoint(&client, &event_table).await.unwrap();
            assert_eq!(checkpoint.realtime_block, Some(261));
            assert_eq!(checkpoint.historical_block, None);
        })
        .await;
    }

    #[tokio::test]
    pub async fn skipped_log_still_advances_cursor() {
        test_runner::run_test(|repo, client| async move {
            let event_table = test_event_table("realtime_skip");
            create_transfers_table(&client, &event_table).await;
            register_checkpoint(&client, &event_table).await;

            let chain = FakeChain::new(250);
            let cancel = CancelFlag::new();
            let handle = spawn_sync(
                transfer_job(&event_table),
                chain.clone(),
                repo.clone(),
                cancel.clone(),
            );

            sleep(Duration::from_millis(100)).await;
            chain.deliver(malformed_log(TEST_CONTRACT_ADDRESS));
            sleep(Duration::from_millis(200)).await;

            cancel.cancel();
            handle.await.unwrap().unwrap();

            assert_eq!(count_rows(&client, &event_table).await, 0);

            let checkpoint = get_checkpoint(&client, &event_table).await.unwrap();
            assert_eq!(checkpoint.realtime_block, Some(260));
        })
        .await;
    }

    #[tokio::test]
    pub async fn subscription_survives_aborted_delivery() {
        test_runner::run_test(|repo, client| async move {
            let event_table = test_event_table("realtime_abort");
            create_transfers_table(&client, &event_table).await;
            register_checkpoint(&client, &event_table).await;

            let chain = FakeChain::new(250);
            let cancel = CancelFlag::new();
            let job = transfer_job(&event_table).with_decode_policy(DecodePolicy::Abort);
            let handle = spawn_sync(job, chain.clone(), repo.clone(), cancel.clone());

            sleep(Duration::from_millis(100)).await;
            chain.deliver(malformed_log(TEST_CONTRACT_ADDRESS));
            sleep(Duration::from_millis(100)).await;
            chain.deliver(transfer_log(TEST_CONTRACT_ADDRESS, 262, 1));
            sleep(Duration::from_millis(200)).await;

            cancel.cancel();
            handle.await.unwrap().unwrap();

            assert_eq!(count_rows(&client, &event_table).await, 1);

            let checkpoint = get_checkpoint(&client, &event_table).await.unwrap();
            assert_eq!(checkpoint.realtime_block, Some(262));
        })
        .await;
    }

    #[tokio::test]
    pub async fn cancellation_releases_the_installed_filter() {
        test_runner::run_test(|repo, client| async move {
            let event_table = test_event_table("realtime_cancel");
            create_transfers_table(&client, &event_table).await;
            register_checkpoint(&client, &event_table).await;

            let chain = FakeChain::new(250);
            let cancel = CancelFlag::new();
            let handle = spawn_sync(
                transfer_job(&event_table),
                chain.clone(),
                repo.clone(),
                cancel.clone(),
            );

            sleep(Duration::from_millis(100)).await;
            assert_eq!(chain.installed_filter_count(), 1);

            cancel.cancel();
            tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap()
                .unwrap();

            assert_eq!(chain.installed_filter_count(), 0);
            assert_eq!(chain.uninstalled_filter_count(), 1);
        })
        .await;
    }

    #[tokio::test]
    pub async fn exhausted_polls_fail_and_release_the_filter() {
        test_runner::run_test(|repo, client| async move {
            let event_table = test_event_table("realtime_poll_failure");
            create_transfers_table(&client, &event_table).await;
            register_checkpoint(&client, &event_table).await;

            let chain = FakeChain::new(250);
            let cancel = CancelFlag::new();
            let handle = spawn_sync(
                transfer_job(&event_table),
                chain.clone(),
                repo.clone(),
                cancel.clone(),
            );

            sleep(Duration::from_millis(100)).await;
            chain.fail_next(10);

            let result = tokio::time::timeout(Duration::from_secs(5), handle)
                .await
                .unwrap()
                .unwrap();

            assert!(matches!(result, Err(SyncError::Provider(_))));
            assert_eq!(chain.uninstalled_filter_count(), 1);
        })
        .await;
    }
}
