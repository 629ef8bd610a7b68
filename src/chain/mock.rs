//! Scriptable in-memory [`ChainClient`] for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{Balance, ChainAddress, ChainClient, ChainError, Coin, CoinType, ProgramCall, TxDigest};
use crate::identity::Identity;

#[derive(Debug, Clone)]
pub(crate) struct MergeCall {
    pub(crate) coin_type: CoinType,
    pub(crate) source_count: usize,
}

#[derive(Default)]
struct MockState {
    holdings: HashMap<CoinType, Vec<u64>>,
    /// Per-coin queues of canned `get_coins` responses, consumed before the
    /// holdings map is consulted. Lets tests model eventually-appearing
    /// balances without a real clock.
    coin_scripts: HashMap<CoinType, VecDeque<Vec<u64>>>,
    get_coins_failures: VecDeque<String>,
    execute_failures: VecDeque<String>,
    merge_calls: Vec<MergeCall>,
    executed: Vec<ProgramCall>,
    inspected: Vec<ProgramCall>,
    digests: u64,
}

pub(crate) struct MockChain {
    state: Mutex<MockState>,
}

impl MockChain {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
        }
    }

    pub(crate) fn set_holdings(&self, coin_type: &CoinType, values: Vec<u64>) {
        self.state
            .lock()
            .unwrap()
            .holdings
            .insert(coin_type.clone(), values);
    }

    pub(crate) fn push_coin_responses(&self, coin_type: &CoinType, responses: Vec<Vec<u64>>) {
        self.state
            .lock()
            .unwrap()
            .coin_scripts
            .entry(coin_type.clone())
            .or_default()
            .extend(responses);
    }

    pub(crate) fn fail_next_get_coins(&self, message: &str) {
        self.state
            .lock()
            .unwrap()
            .get_coins_failures
            .push_back(message.to_string());
    }

    pub(crate) fn fail_next_execute(&self, message: &str) {
        self.state
            .lock()
            .unwrap()
            .execute_failures
            .push_back(message.to_string());
    }

    pub(crate) fn holdings(&self, coin_type: &CoinType) -> Vec<u64> {
        self.state
            .lock()
            .unwrap()
            .holdings
            .get(coin_type)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn merge_calls(&self) -> Vec<MergeCall> {
        self.state.lock().unwrap().merge_calls.clone()
    }

    pub(crate) fn executed_calls(&self) -> Vec<ProgramCall> {
        self.state.lock().unwrap().executed.clone()
    }

    pub(crate) fn inspected_calls(&self) -> Vec<ProgramCall> {
        self.state.lock().unwrap().inspected.clone()
    }
}

fn coins_from_values(values: &[u64]) -> Vec<Coin> {
    values
        .iter()
        .enumerate()
        .map(|(index, balance)| Coin {
            object_id: format!("c{index}"),
            balance: *balance,
        })
        .collect()
}

fn coin_index(object_id: &str) -> Option<usize> {
    object_id.strip_prefix('c').and_then(|raw| raw.parse().ok())
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_all_balances(&self, _owner: &ChainAddress) -> Result<Vec<Balance>, ChainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .holdings
            .iter()
            .map(|(coin_type, values)| Balance {
                coin_type: coin_type.clone(),
                total: values.iter().map(|value| u128::from(*value)).sum(),
            })
            .collect())
    }

    async fn get_coins(
        &self,
        _owner: &ChainAddress,
        coin_type: &CoinType,
    ) -> Result<Vec<Coin>, ChainError> {
        let mut state = self.state.lock().unwrap();

        if let Some(message) = state.get_coins_failures.pop_front() {
            return Err(ChainError::Rpc {
                code: -32000,
                message,
            });
        }

        if let Some(scripted) = state
            .coin_scripts
            .get_mut(coin_type)
            .and_then(VecDeque::pop_front)
        {
            return Ok(coins_from_values(&scripted));
        }

        Ok(coins_from_values(
            state.holdings.get(coin_type).map(Vec::as_slice).unwrap_or(&[]),
        ))
    }

    async fn merge_coins(
        &self,
        _signer: &Identity,
        coin_type: &CoinType,
        primary: &Coin,
        sources: &[Coin],
    ) -> Result<TxDigest, ChainError> {
        let mut state = self.state.lock().unwrap();

        state.merge_calls.push(MergeCall {
            coin_type: coin_type.clone(),
            source_count: sources.len(),
        });

        if let Some(primary_index) = coin_index(&primary.object_id) {
            let consumed: Vec<usize> = sources
                .iter()
                .filter_map(|coin| coin_index(&coin.object_id))
                .collect();
            let merged: u64 =
                primary.balance + sources.iter().map(|coin| coin.balance).sum::<u64>();

            let values = state.holdings.entry(coin_type.clone()).or_default();
            *values = values
                .iter()
                .enumerate()
                .filter_map(|(index, value)| {
                    if index == primary_index {
                        Some(merged)
                    } else if consumed.contains(&index) {
                        None
                    } else {
                        Some(*value)
                    }
                })
                .collect();
        }

        state.digests += 1;
        Ok(TxDigest(format!("mock-merge-{}", state.digests)))
    }

    async fn execute_call(
        &self,
        _signer: &Identity,
        call: &ProgramCall,
    ) -> Result<TxDigest, ChainError> {
        let mut state = self.state.lock().unwrap();

        if let Some(message) = state.execute_failures.pop_front() {
            return Err(ChainError::Rpc {
                code: -32000,
                message,
            });
        }

        state.executed.push(call.clone());
        state.digests += 1;
        Ok(TxDigest(format!("mock-exec-{}", state.digests)))
    }

    async fn dev_inspect(
        &self,
        _sender: &ChainAddress,
        call: &ProgramCall,
    ) -> Result<Value, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.inspected.push(call.clone());
        Ok(json!({
            "effects": {"status": {"status": "success"}},
            "results": [],
        }))
    }
}
