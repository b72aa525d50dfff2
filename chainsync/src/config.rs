use std::collections::HashSet;
use std::sync::Arc;

use derive_more::Display;

use crate::jobs::SyncJob;
use crate::provider::ProviderSource;
use crate::retry::RetryPolicy;
use crate::ChainsyncRepo;

/// ~24 hours worth of mainnet blocks.
pub const DEFAULT_BLOCKS_PER_WINDOW: u64 = 5_760;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[display("at least one sync job must be added")]
    NoJobs,
    #[display("more than one sync job writes to event table '{_0}'")]
    DuplicateEventTable(String),
    #[display("invalid contract address: '{_0}'")]
    InvalidAddress(String),
    #[display("invalid deploy transaction hash: '{_0}'")]
    InvalidTxHash(String),
    #[display("invalid event abi: '{_0}'")]
    InvalidEventAbi(String),
    #[display("invalid json rpc url: '{_0}'")]
    InvalidRpcUrl(String),
}

impl std::error::Error for ConfigError {}

/// What the coordinator does when one job fails permanently.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Restart the failed job after a delay. Other jobs keep running.
    #[default]
    RestartJob,
    /// Cancel every job and surface the error.
    StopAll,
}

pub struct Config<S: ProviderSource> {
    pub repo: ChainsyncRepo,
    pub provider_source: Arc<S>,
    pub jobs: Vec<SyncJob>,
    pub blocks_per_window: u64,
    pub realtime_poll_ms: u64,
    pub job_restart_delay_ms: u64,
    pub retry_policy: RetryPolicy,
    pub failure_policy: FailurePolicy,
}

impl<S: ProviderSource> Clone for Config<S> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            provider_source: self.provider_source.clone(),
            jobs: self.jobs.clone(),
            blocks_per_window: self.blocks_per_window,
            realtime_poll_ms: self.realtime_poll_ms,
            job_restart_delay_ms: self.job_restart_delay_ms,
            retry_policy: self.retry_policy,
            failure_policy: self.failure_policy,
        }
    }
}

impl<S: ProviderSource> Config<S> {
    pub fn new(repo: ChainsyncRepo, provider_source: S) -> Self {
        Self {
            repo,
            provider_source: Arc::new(provider_source),
            jobs: vec![],
            blocks_per_window: DEFAULT_BLOCKS_PER_WINDOW,
            realtime_poll_ms: 1_000,
            job_restart_delay_ms: 5_000,
            retry_policy: RetryPolicy::default(),
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn add_job(mut self, job: SyncJob) -> Self {
        self.jobs.push(job);

        self
    }

    pub fn with_blocks_per_window(mut self, blocks_per_window: u64) -> Self {
        self.blocks_per_window = blocks_per_window;

        self
    }

    pub fn with_realtime_poll_ms(mut self, realtime_poll_ms: u64) -> Self {
        self.realtime_poll_ms = realtime_poll_ms;

        self
    }

    pub fn with_job_restart_delay_ms(mut self, job_restart_delay_ms: u64) -> Self {
        self.job_restart_delay_ms = job_restart_delay_ms;

        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;

        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;

        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.jobs.is_empty() {
            return Err(ConfigError::NoJobs);
        }

        let mut event_tables = HashSet::new();

        for job in &self.jobs {
            if !event_tables.insert(job.event_table.as_str()) {
                return Err(ConfigError::DuplicateEventTable(job.event_table.clone()));
            }
        }

        Ok(())
    }
}
