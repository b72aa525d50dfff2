//! Synchronizes EVM smart-contract event logs into Postgres. Each
//! configured job backfills its contract's history in block windows while a
//! realtime subscription keeps it current, with both passes checkpointed
//! independently so restarts resume instead of re-scanning.
//!
//! ```ignore
//! let config = Config::new(repo, provider_source)
//!     .add_job(transfers_job)
//!     .with_blocks_per_window(5_760);
//!
//! chainsync::run(config, CancelFlag::new()).await?;
//! ```

mod cancellation;
mod checkpoints;
mod config;
mod coordinator;
mod diesel;
mod hashes;
mod jobs;
mod repos;
mod retry;

pub mod events;
pub mod historical;
pub mod provider;
pub mod realtime;

pub use cancellation::CancelFlag;
pub use checkpoints::{Checkpoint, UnsavedCheckpoint};
pub use config::{Config, ConfigError, FailurePolicy, DEFAULT_BLOCKS_PER_WINDOW};
pub use events::{BulkWriter, DecodeError, DecodePolicy, EventDecoder, EventIdentity};
pub use jobs::SyncJob;
pub use provider::{ChainProvider, JsonRpcProviderSource, ProviderError, ProviderSource};
pub use repos::*;
pub use retry::RetryPolicy;

pub use ethers::types::{Address, TxHash, U256, U64};

use derive_more::Display;

#[cfg(feature = "postgres")]
pub type ChainsyncRepo = repos::PostgresRepo;

#[cfg(feature = "postgres")]
pub type ChainsyncRepoPool = repos::PostgresRepoPool;

#[cfg(feature = "postgres")]
pub type ChainsyncRepoConn<'a> = repos::PostgresRepoConn<'a>;

#[cfg(feature = "postgres")]
pub type ChainsyncRepoClient = repos::PostgresRepoClient;

#[cfg(feature = "postgres")]
pub type ChainsyncRepoTxnClient<'a> = repos::PostgresRepoTxnClient<'a>;

#[derive(Debug, Display)]
pub enum SyncError {
    #[display("deploy transaction '{tx_hash}' is unknown or not yet mined")]
    UnresolvedDeployBlock { tx_hash: String },
    #[display("chain client error: {_0}")]
    Provider(ProviderError),
    #[display("repo error: {_0}")]
    Repo(RepoError),
    #[display("config error: {_0}")]
    Config(ConfigError),
    #[display("undecodable event for table '{event_table}': {error}")]
    Decode {
        event_table: String,
        error: DecodeError,
    },
    #[display("sync job panicked: {_0}")]
    JobPanicked(String),
}

impl std::error::Error for SyncError {}

impl From<ProviderError> for SyncError {
    fn from(error: ProviderError) -> Self {
        Self::Provider(error)
    }
}

impl From<RepoError> for SyncError {
    fn from(error: RepoError) -> Self {
        Self::Repo(error)
    }
}

impl From<ConfigError> for SyncError {
    fn from(error: ConfigError) -> Self {
        Self::Config(error)
    }
}

/// Runs every configured sync job to completion. Returns when all jobs'
/// realtime passes are cancelled through `cancel`, or when a job fails
/// under [`FailurePolicy::StopAll`].
pub async fn run<S: ProviderSource + 'static>(
    config: Config<S>,
    cancel: CancelFlag,
) -> Result<(), SyncError> {
    coordinator::run(config, cancel).await
}
