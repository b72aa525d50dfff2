use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ethers::abi::HumanReadableParser;
use ethers::types::{Address, Filter as EthersFilter, TxHash};

use crate::config::ConfigError;
use crate::events::{BulkWriter, DecodePolicy, DecodingSink, EventDecoder, LogSink};

/// One contract-event synchronization job: a contract, the event it emits,
/// the table its records land in, and the decoder/writer pair that gets
/// them there.
#[derive(Clone)]
pub struct SyncJob {
    pub event_table: String,
    pub contract_address: Address,
    pub deploy_tx_hash: TxHash,
    pub event_abi: String,
    pub decode_policy: DecodePolicy,
    pub(crate) filter: EthersFilter,
    pub(crate) sink: Arc<dyn LogSink>,
}

impl fmt::Debug for SyncJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncJob")
            .field("event_table", &self.event_table)
            .field("contract_address", &self.contract_address)
            .field("deploy_tx_hash", &self.deploy_tx_hash)
            .field("event_abi", &self.event_abi)
            .field("decode_policy", &self.decode_policy)
            .finish_non_exhaustive()
    }
}

impl SyncJob {
    pub fn new<D, W>(
        event_table: &str,
        contract_address: &str,
        deploy_tx_hash: &str,
        event_abi: &str,
        decoder: D,
        writer: W,
    ) -> Result<Self, ConfigError>
    where
        D: EventDecoder + 'static,
        W: BulkWriter<Record = D::Record> + 'static,
    {
        let contract_address = Address::from_str(contract_address)
            .map_err(|_| ConfigError::InvalidAddress(contract_address.to_string()))?;
        let deploy_tx_hash = TxHash::from_str(deploy_tx_hash)
            .map_err(|_| ConfigError::InvalidTxHash(deploy_tx_hash.to_string()))?;
        let event = HumanReadableParser::parse_event(event_abi)
            .map_err(|_| ConfigError::InvalidEventAbi(event_abi.to_string()))?;

        let filter = EthersFilter::new()
            .address(contract_address)
            .topic0(event.signature());

        Ok(Self {
            event_table: event_table.to_string(),
            contract_address,
            deploy_tx_hash,
            event_abi: event_abi.to_string(),
            decode_policy: DecodePolicy::default(),
            filter,
            sink: Arc::new(DecodingSink::new(decoder, writer)),
        })
    }

    pub fn with_decode_policy(mut self, decode_policy: DecodePolicy) -> Self {
        self.decode_policy = decode_policy;

        self
    }
}
