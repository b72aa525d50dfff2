use std::str::FromStr;

use ethers::types::{Bytes, Log, H160, H256};

const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

pub fn transfer_log(contract_address: &str, block_number: u64, log_index: u64) -> Log {
    Log {
        address: H160::from_str(contract_address).unwrap(),
        topics: vec![
            h256(TRANSFER_TOPIC),
            h256("0x000000000000000000000000b518b3136e491101f22b77f385fe22269c515188"),
            h256("0x0000000000000000000000007dfd6013cf8d92b751e63d481b51fe0e4c5abf5e"),
            H256::from_low_u64_be(block_number * 1_000 + log_index),
        ],
        data: Bytes::default(),
        block_hash: Some(H256::from_low_u64_be(block_number)),
        block_number: Some(block_number.into()),
        transaction_hash: Some(H256::from_low_u64_be(block_number * 1_000 + log_index)),
        transaction_index: Some(0.into()),
        log_index: Some(log_index.into()),
        transaction_log_index: None,
        log_type: None,
        removed: Some(false),
    }
}

/// A transfer log whose data carries one byte per batched item. The batch
/// decoder expands it into one record per byte.
pub fn batch_transfer_log(
    contract_address: &str,
    block_number: u64,
    log_index: u64,
    token_ids: &[u8],
) -> Log {
    let mut log = transfer_log(contract_address, block_number, log_index);
    log.data = Bytes::from(token_ids.to_vec());

    log
}

/// A log missing the fields decoders need, as a node bug would produce.
pub fn malformed_log(contract_address: &str) -> Log {
    let mut log = transfer_log(contract_address, 260, 0);
    log.log_index = None;

    log
}

fn h256(str: &str) -> H256 {
    H256::from_str(str).unwrap()
}
