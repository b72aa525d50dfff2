use chainsync::{
    BulkWriter, ChainsyncRepoTxnClient, DecodeError, EventDecoder, EventIdentity, RepoError,
    SyncJob,
};
use chainsync::{ChainsyncRepoClient, ExecutesWithRawQuery};
use ethers::types::{Log, U256};

pub const TEST_CONTRACT_ADDRESS: &str = "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D";
pub const TEST_DEPLOY_TX_HASH: &str =
    "0x22199329b0aa1aa68902a78e3b32ca327c872fab166c7a2838273de6ad383eba";
pub const TRANSFER_EVENT_ABI: &str =
    "event Transfer(address indexed from, address indexed to, uint256 indexed tokenId)";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestTransfer {
    pub block_number: i64,
    pub log_index: i32,
    pub sub_index: i32,
    pub transaction_hash: String,
    pub token_id: i64,
}

pub struct TransferDecoder;

impl EventDecoder for TransferDecoder {
    type Record = TestTransfer;

    fn decode(&self, log: &Log) -> Result<Vec<TestTransfer>, DecodeError> {
        let identity = EventIdentity::from_log(log)?;
        let token_id = indexed_token_id(log)?;

        Ok(vec![TestTransfer {
            block_number: identity.block_number,
            log_index: identity.log_index,
            sub_index: 0,
            transaction_hash: identity.transaction_hash_hex(),
            token_id,
        }])
    }
}

/// Expands one batch log into one record per item, distinguished through
/// `sub_index` so items stay unique under `(block_number, log_index)`.
pub struct BatchTransferDecoder;

impl EventDecoder for BatchTransferDecoder {
    type Record = TestTransfer;

    fn decode(&self, log: &Log) -> Result<Vec<TestTransfer>, DecodeError> {
        let identity = EventIdentity::from_log(log)?;

        if log.data.is_empty() {
            return Err(DecodeError("batch log has no items".to_string()));
        }

        Ok(log
            .data
            .iter()
            .enumerate()
            .map(|(sub_index, token_id)| TestTransfer {
                block_number: identity.block_number,
                log_index: identity.log_index,
                sub_index: sub_index as i32,
                transaction_hash: identity.transaction_hash_hex(),
                token_id: *token_id as i64,
            })
            .collect())
    }
}

pub struct TransferWriter {
    event_table: String,
}

impl TransferWriter {
    pub fn new(event_table: &str) -> Self {
        Self {
            event_table: event_table.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl BulkWriter for TransferWriter {
    type Record = TestTransfer;

    async fn write<'a>(
        &self,
        client: &ChainsyncRepoTxnClient<'a>,
        records: &[TestTransfer],
    ) -> Result<(), RepoError> {
        let values = records
            .iter()
            .map(|record| {
                format!(
                    "({}, {}, {}, '{}', {})",
                    record.block_number,
                    record.log_index,
                    record.sub_index,
                    record.transaction_hash,
                    record.token_id
                )
            })
            .collect::<Vec<_>>()
            .join(", ");

        chainsync::ChainsyncRepo::execute_in_txn(
            client,
            &format!(
                "INSERT INTO {table} (block_number, log_index, sub_index, transaction_hash, token_id)
                 VALUES {values}
                 ON CONFLICT (block_number, log_index, sub_index) DO NOTHING",
                table = self.event_table,
            ),
        )
        .await
    }
}

/// Fails every write, for exercising transaction rollback and job restarts.
pub struct FailingWriter;

#[async_trait::async_trait]
impl BulkWriter for FailingWriter {
    type Record = TestTransfer;

    async fn write<'a>(
        &self,
        _client: &ChainsyncRepoTxnClient<'a>,
        _records: &[TestTransfer],
    ) -> Result<(), RepoError> {
        Err(RepoError::Unknown("writer always fails".to_string()))
    }
}

pub async fn create_transfers_table(client: &ChainsyncRepoClient, event_table: &str) {
    chainsync::ChainsyncRepo::execute(
        client,
        &format!(
            "CREATE TABLE IF NOT EXISTS {event_table} (
                block_number BIGINT NOT NULL,
                log_index INTEGER NOT NULL,
                sub_index INTEGER NOT NULL,
                transaction_hash VARCHAR NOT NULL,
                token_id BIGINT NOT NULL,
                UNIQUE (block_number, log_index, sub_index)
            )"
        ),
    )
    .await
    .unwrap();
}

/// Event tables are per-test so committed rows never leak across tests.
pub fn test_event_table(prefix: &str) -> String {
    format!("{}_{}", prefix, rand::random::<u32>())
}

pub fn transfer_job(event_table: &str) -> SyncJob {
    SyncJob::new(
        event_table,
        TEST_CONTRACT_ADDRESS,
        TEST_DEPLOY_TX_HASH,
        TRANSFER_EVENT_ABI,
        TransferDecoder,
        TransferWriter::new(event_table),
    )
    .unwrap()
}

pub fn batch_transfer_job(event_table: &str) -> SyncJob {
    SyncJob::new(
        event_table,
        TEST_CONTRACT_ADDRESS,
        TEST_DEPLOY_TX_HASH,
        TRANSFER_EVENT_ABI,
        BatchTransferDecoder,
        TransferWriter::new(event_table),
    )
    .unwrap()
}

fn indexed_token_id(log: &Log) -> Result<i64, DecodeError> {
    let topic = log
        .topics
        .get(3)
        .ok_or_else(|| DecodeError("transfer log has no tokenId topic".to_string()))?;

    Ok(U256::from_big_endian(topic.as_bytes()).as_u64() as i64)
}
