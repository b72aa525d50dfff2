use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use crate::cancellation::CancelFlag;
use crate::provider::{ProviderError, ProviderSource};

/// Bounded retry with exponential backoff for chain-client calls. Every
/// failed attempt re-acquires the provider before the next try.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 32_000,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, retries_so_far: u32) -> Duration {
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(retries_so_far));

        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}

pub(crate) async fn with_retry<S, T, F, Fut>(
    source: &S,
    policy: &RetryPolicy,
    cancel: &CancelFlag,
    op: F,
) -> Result<T, ProviderError>
where
    S: ProviderSource,
    F: Fn(Arc<S::Provider>) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut provider = source.get().await;
    let mut retries_so_far = 0;

    loop {
        match op(provider.clone()).await {
            Ok(value) => return Ok(value),
            Err(provider_error) => {
                retries_so_far += 1;

                // Cancellation must not wait out the backoff schedule.
                if retries_so_far >= policy.max_attempts || cancel.is_cancelled() {
                    return Err(provider_error);
                }

                tracing::warn!(
                    retries_so_far,
                    error = %provider_error,
                    "provider call failed, reacquiring endpoint"
                );

                sleep(policy.backoff(retries_so_far - 1)).await;
                provider = source.reacquire().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use ethers::types::{Filter as EthersFilter, Log, Transaction, TxHash, U256, U64};

    use crate::provider::ChainProvider;

    use super::*;

    #[derive(Clone, Default)]
    struct FlakyProvider {
        failures_left: Arc<AtomicU32>,
        calls: Arc<AtomicU32>,
    }

    impl FlakyProvider {
        fn failing_first(failures: u32) -> Self {
            Self {
                failures_left: Arc::new(AtomicU32::new(failures)),
                calls: Arc::new(AtomicU32::new(0)),
            }
        }

        fn respond(&self) -> Result<U64, ProviderError> {
            self.calls.fetch_add(1, Ordering::Relaxed);

            if self.failures_left.load(Ordering::Relaxed) > 0 {
                self.failures_left.fetch_sub(1, Ordering::Relaxed);

                Err(ProviderError::CustomError("injected failure".to_string()))
            } else {
                Ok(U64::from(42))
            }
        }
    }

    #[async_trait::async_trait]
    impl ChainProvider for FlakyProvider {
        async fn get_block_number(&self) -> Result<U64, ProviderError> {
            self.respond()
        }

        async fn get_transaction(
            &self,
            _hash: TxHash,
        ) -> Result<Option<Transaction>, ProviderError> {
            Ok(None)
        }

        async fn get_logs(&self, _filter: &EthersFilter) -> Result<Vec<Log>, ProviderError> {
            Ok(vec![])
        }

        async fn install_log_filter(&self, _filter: &EthersFilter) -> Result<U256, ProviderError> {
            Ok(U256::zero())
        }

        async fn poll_log_filter(&self, _filter_id: U256) -> Result<Vec<Log>, ProviderError> {
            Ok(vec![])
        }

        async fn uninstall_log_filter(&self, _filter_id: U256) -> Result<bool, ProviderError> {
            Ok(true)
        }
    }

    struct StaticSource {
        provider: FlakyProvider,
        reacquired: AtomicU32,
    }

    impl StaticSource {
        fn new(provider: FlakyProvider) -> Self {
            Self {
                provider,
                reacquired: AtomicU32::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ProviderSource for StaticSource {
        type Provider = FlakyProvider;

        async fn get(&self) -> Arc<FlakyProvider> {
            Arc::new(self.provider.clone())
        }

        async fn reacquire(&self) -> Arc<FlakyProvider> {
            self.reacquired.fetch_add(1, Ordering::Relaxed);

            self.get().await
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
        }
    }

    #[tokio::test]
    async fn returns_first_success() {
        let source = StaticSource::new(FlakyProvider::failing_first(0));

        let block_number = with_retry(&source, &fast_policy(), &CancelFlag::new(), |provider| async move {
            provider.get_block_number().await
        })
        .await
        .unwrap();

        assert_eq!(block_number, U64::from(42));
        assert_eq!(source.reacquired.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn reacquires_provider_between_attempts() {
        let source = StaticSource::new(FlakyProvider::failing_first(2));

        let block_number = with_retry(&source, &fast_policy(), &CancelFlag::new(), |provider| async move {
            provider.get_block_number().await
        })
        .await
        .unwrap();

        assert_eq!(block_number, U64::from(42));
        assert_eq!(source.reacquired.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let provider = FlakyProvider::failing_first(10);
        let source = StaticSource::new(provider.clone());

        let result = with_retry(&source, &fast_policy(), &CancelFlag::new(), |provider| async move {
            provider.get_block_number().await
        })
        .await;

        assert!(result.is_err());
        assert_eq!(provider.calls.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn cancellation_stops_further_attempts() {
        let provider = FlakyProvider::failing_first(10);
        let source = StaticSource::new(provider.clone());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = with_retry(&source, &fast_policy(), &cancel, |provider| async move {
            provider.get_block_number().await
        })
        .await;

        assert!(result.is_err());
        assert_eq!(provider.calls.load(Ordering::Relaxed), 1);
        assert_eq!(source.reacquired.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 1_000,
            max_delay_ms: 4_000,
        };

        assert_eq!(policy.backoff(0), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(1), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(2), Duration::from_millis(4_000));
        assert_eq!(policy.backoff(5), Duration::from_millis(4_000));
    }
}
