use std::sync::Arc;

use ethers::prelude::Middleware;
use ethers::providers::{
    FilterKind, Http, Provider as EthersProvider, ProviderError as EthersProviderError,
};
use ethers::types::{Filter as EthersFilter, Log, Transaction, TxHash, U256, U64};
use tokio::sync::RwLock;

use crate::config::ConfigError;

pub type ProviderError = EthersProviderError;

/// The slice of a chain node's JSON-RPC surface the engine consumes.
///
/// The installed-filter triple (`install_log_filter`/`poll_log_filter`/
/// `uninstall_log_filter`) is the push-subscription primitive: the node
/// buffers matching logs under a filter id until they are drained.
#[async_trait::async_trait]
pub trait ChainProvider: Clone + Sync + Send {
    async fn get_block_number(&self) -> Result<U64, ProviderError>;
    async fn get_transaction(&self, hash: TxHash) -> Result<Option<Transaction>, ProviderError>;
    async fn get_logs(&self, filter: &EthersFilter) -> Result<Vec<Log>, ProviderError>;

    async fn install_log_filter(&self, filter: &EthersFilter) -> Result<U256, ProviderError>;
    async fn poll_log_filter(&self, filter_id: U256) -> Result<Vec<Log>, ProviderError>;
    async fn uninstall_log_filter(&self, filter_id: U256) -> Result<bool, ProviderError>;
}

#[async_trait::async_trait]
impl ChainProvider for EthersProvider<Http> {
    async fn get_block_number(&self) -> Result<U64, ProviderError> {
        Middleware::get_block_number(self).await
    }

    async fn get_transaction(&self, hash: TxHash) -> Result<Option<Transaction>, ProviderError> {
        Middleware::get_transaction(self, hash).await
    }

    async fn get_logs(&self, filter: &EthersFilter) -> Result<Vec<Log>, ProviderError> {
        Middleware::get_logs(self, filter).await
    }

    async fn install_log_filter(&self, filter: &EthersFilter) -> Result<U256, ProviderError> {
        Middleware::new_filter(self, FilterKind::Logs(filter)).await
    }

    async fn poll_log_filter(&self, filter_id: U256) -> Result<Vec<Log>, ProviderError> {
        Middleware::get_filter_changes(self, filter_id).await
    }

    async fn uninstall_log_filter(&self, filter_id: U256) -> Result<bool, ProviderError> {
        Middleware::uninstall_filter(self, filter_id).await
    }
}

/// Hands out the current provider and can re-acquire the endpoint after a
/// failed call (reconnect/re-resolve), which the retry policy triggers
/// between attempts.
#[async_trait::async_trait]
pub trait ProviderSource: Send + Sync {
    type Provider: ChainProvider + 'static;

    async fn get(&self) -> Arc<Self::Provider>;
    async fn reacquire(&self) -> Arc<Self::Provider>;
}

pub struct JsonRpcProviderSource {
    json_rpc_url: String,
    current: RwLock<Arc<EthersProvider<Http>>>,
}

impl JsonRpcProviderSource {
    pub fn new(json_rpc_url: &str) -> Result<Self, ConfigError> {
        let provider = EthersProvider::<Http>::try_from(json_rpc_url)
            .map_err(|error| ConfigError::InvalidRpcUrl(format!("{json_rpc_url}: {error}")))?;

        Ok(Self {
            json_rpc_url: json_rpc_url.to_string(),
            current: RwLock::new(Arc::new(provider)),
        })
    }
}

#[async_trait::async_trait]
impl ProviderSource for JsonRpcProviderSource {
    type Provider = EthersProvider<Http>;

    async fn get(&self) -> Arc<EthersProvider<Http>> {
        self.current.read().await.clone()
    }

    async fn reacquire(&self) -> Arc<EthersProvider<Http>> {
        match EthersProvider::<Http>::try_from(self.json_rpc_url.as_str()) {
            Ok(provider) => {
                let provider = Arc::new(provider);
                *self.current.write().await = provider.clone();

                provider
            }
            Err(error) => {
                tracing::warn!(%error, "could not rebuild json-rpc provider, keeping current one");

                self.get().await
            }
        }
    }
}
