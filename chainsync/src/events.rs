use derive_more::Display;
use ethers::types::{Log, H160, H256};

use crate::hashes::{h160_to_string, h256_to_string};
use crate::repos::RepoError;
use crate::{ChainsyncRepoTxnClient, SyncError};

/// Raised when a fetched log cannot be turned into domain records.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
#[display("undecodable log: {_0}")]
pub struct DecodeError(pub String);

impl std::error::Error for DecodeError {}

/// What a sync job does with logs its decoder rejects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Log a warning and move on. The block window still completes and the
    /// cursor still advances past the bad log.
    #[default]
    SkipAndLog,
    /// Reject the batch holding the bad log: a historical window fails
    /// wholesale and nothing from it is committed, while a realtime
    /// delivery is dropped on its own and the subscription stays up.
    Abort,
}

/// The chain-assigned coordinates of a fetched log. `(block_number,
/// log_index)` uniquely identifies the log on its chain, which is what
/// makes idempotent persistence possible.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventIdentity {
    pub block_number: i64,
    pub log_index: i32,
    pub transaction_hash: H256,
    pub contract_address: H160,
}

impl EventIdentity {
    pub fn from_log(log: &Log) -> Result<Self, DecodeError> {
        let block_number = log
            .block_number
            .ok_or_else(|| DecodeError("log has no block number".to_string()))?;
        let log_index = log
            .log_index
            .ok_or_else(|| DecodeError("log has no log index".to_string()))?;
        let transaction_hash = log
            .transaction_hash
            .ok_or_else(|| DecodeError("log has no transaction hash".to_string()))?;

        Ok(Self {
            block_number: block_number.as_u64() as i64,
            log_index: log_index.as_u64() as i32,
            transaction_hash,
            contract_address: log.address,
        })
    }

    pub fn transaction_hash_hex(&self) -> String {
        h256_to_string(&self.transaction_hash)
    }

    pub fn contract_address_hex(&self) -> String {
        h160_to_string(&self.contract_address)
    }
}

/// Turns raw logs into a job's domain records. One log may yield several
/// records, e.g. a batch event expanding into one record per item.
pub trait EventDecoder: Send + Sync {
    type Record: Send + Sync;

    fn decode(&self, log: &Log) -> Result<Vec<Self::Record>, DecodeError>;
}

/// Persists a job's decoded records inside the transaction that also
/// advances the job's checkpoint. Writes must be idempotent: the same
/// records may arrive again after a restart.
#[async_trait::async_trait]
pub trait BulkWriter: Send + Sync {
    type Record: Send + Sync;

    async fn write<'a>(
        &self,
        client: &ChainsyncRepoTxnClient<'a>,
        records: &[Self::Record],
    ) -> Result<(), RepoError>;
}

/// Object-safe front over a decoder/writer pair, so jobs with different
/// record types can live in one coordinator.
#[async_trait::async_trait]
pub(crate) trait LogSink: Send + Sync {
    async fn persist<'a>(
        &self,
        client: &ChainsyncRepoTxnClient<'a>,
        event_table: &str,
        logs: &[Log],
        policy: DecodePolicy,
    ) -> Result<(), SyncError>;
}

pub(crate) struct DecodingSink<D, W> {
    decoder: D,
    writer: W,
}

impl<D, W> DecodingSink<D, W> {
    pub fn new(decoder: D, writer: W) -> Self {
        Self { decoder, writer }
    }
}

#[async_trait::async_trait]
impl<D, W> LogSink for DecodingSink<D, W>
where
    D: EventDecoder,
    W: BulkWriter<Record = D::Record>,
{
    async fn persist<'a>(
        &self,
        client: &ChainsyncRepoTxnClient<'a>,
        event_table: &str,
        logs: &[Log],
        policy: DecodePolicy,
    ) -> Result<(), SyncError> {
        let mut records = Vec::new();

        for log in logs {
            match self.decoder.decode(log) {
                Ok(decoded) => records.extend(decoded),
                Err(error) => match policy {
                    DecodePolicy::SkipAndLog => {
                        tracing::warn!(event_table, %error, "skipping undecodable log");
                    }
                    DecodePolicy::Abort => {
                        return Err(SyncError::Decode {
                            event_table: event_table.to_string(),
                            error,
                        })
                    }
                },
            }
        }

        if records.is_empty() {
            return Ok(());
        }

        self.writer.write(client, &records).await?;

        Ok(())
    }
}
