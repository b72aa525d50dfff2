use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use chainsync::provider::{ChainProvider, ProviderError, ProviderSource};
use ethers::types::{Filter, Log, Transaction, TxHash, U256, U64};

/// An in-memory chain node. Cloning shares the underlying state, so a test
/// can keep a handle for stubbing and assertions while the sync passes use
/// their own clones.
#[derive(Clone)]
pub struct FakeChain {
    state: Arc<Mutex<FakeChainState>>,
}

#[derive(Default)]
struct FakeChainState {
    head: u64,
    transactions: HashMap<TxHash, Transaction>,
    logs: Vec<Log>,
    subscriptions: HashMap<U256, Vec<Log>>,
    next_filter_id: u64,
    queried_ranges: Vec<(u64, u64)>,
    uninstalled: Vec<U256>,
    failures_remaining: u32,
}

impl FakeChain {
    pub fn new(head: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeChainState {
                head,
                next_filter_id: 1,
                ..Default::default()
            })),
        }
    }

    pub fn with_deploy_tx(self, tx_hash: TxHash, block_number: u64) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.transactions.insert(
                tx_hash,
                Transaction {
                    hash: tx_hash,
                    block_number: Some(U64::from(block_number)),
                    ..Default::default()
                },
            );
        }

        self
    }

    pub fn with_unmined_deploy_tx(self, tx_hash: TxHash) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.transactions.insert(
                tx_hash,
                Transaction {
                    hash: tx_hash,
                    block_number: None,
                    ..Default::default()
                },
            );
        }

        self
    }

    pub fn push_log(&self, log: Log) {
        self.state.lock().unwrap().logs.push(log);
    }

    /// Queues a log for delivery through every installed filter's next poll.
    pub fn deliver(&self, log: Log) {
        let mut state = self.state.lock().unwrap();

        for delivered in state.subscriptions.values_mut() {
            delivered.push(log.clone());
        }
    }

    /// Makes the next `count` provider calls fail.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().unwrap().failures_remaining = count;
    }

    pub fn queried_ranges(&self) -> Vec<(u64, u64)> {
        self.state.lock().unwrap().queried_ranges.clone()
    }

    pub fn installed_filter_count(&self) -> usize {
        self.state.lock().unwrap().subscriptions.len()
    }

    pub fn uninstalled_filter_count(&self) -> usize {
        self.state.lock().unwrap().uninstalled.len()
    }

    fn fail_if_scheduled(state: &mut FakeChainState) -> Result<(), ProviderError> {
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;

            Err(ProviderError::CustomError("scheduled failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl ChainProvider for FakeChain {
    async fn get_block_number(&self) -> Result<U64, ProviderError> {
        let mut state = self.state.lock().unwrap();
        Self::fail_if_scheduled(&mut state)?;

        Ok(U64::from(state.head))
    }

    async fn get_transaction(&self, hash: TxHash) -> Result<Option<Transaction>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        Self::fail_if_scheduled(&mut state)?;

        Ok(state.transactions.get(&hash).cloned())
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        Self::fail_if_scheduled(&mut state)?;

        let from = filter.get_from_block().map_or(0, |block| block.as_u64());
        let to = filter.get_to_block().map_or(u64::MAX, |block| block.as_u64());

        state.queried_ranges.push((from, to));

        let logs = state
            .logs
            .iter()
            .filter(|log| {
                log.block_number
                    .is_some_and(|block| (from..=to).contains(&block.as_u64()))
            })
            .cloned()
            .collect();

        Ok(logs)
    }

    async fn install_log_filter(&self, _filter: &Filter) -> Result<U256, ProviderError> {
        let mut state = self.state.lock().unwrap();
        Self::fail_if_scheduled(&mut state)?;

        let filter_id = U256::from(state.next_filter_id);
        state.next_filter_id += 1;
        state.subscriptions.insert(filter_id, vec![]);

        Ok(filter_id)
    }

    async fn poll_log_filter(&self, filter_id: U256) -> Result<Vec<Log>, ProviderError> {
        let mut state = self.state.lock().unwrap();
        Self::fail_if_scheduled(&mut state)?;

        Ok(state
            .subscriptions
            .get_mut(&filter_id)
            .map(std::mem::take)
            .unwrap_or_default())
    }

    async fn uninstall_log_filter(&self, filter_id: U256) -> Result<bool, ProviderError> {
        let mut state = self.state.lock().unwrap();

        state.uninstalled.push(filter_id);

        Ok(state.subscriptions.remove(&filter_id).is_some())
    }
}

pub struct FakeChainSource {
    chain: FakeChain,
    reacquire_count: AtomicU32,
}

impl FakeChainSource {
    pub fn new(chain: FakeChain) -> Self {
        Self {
            chain,
            reacquire_count: AtomicU32::new(0),
        }
    }

    pub fn reacquire_count(&self) -> u32 {
        self.reacquire_count.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl ProviderSource for FakeChainSource {
    type Provider = FakeChain;

    async fn get(&self) -> Arc<FakeChain> {
        Arc::new(self.chain.clone())
    }

    async fn reacquire(&self) -> Arc<FakeChain> {
        self.reacquire_count.fetch_add(1, Ordering::Relaxed);

        self.get().await
    }
}
