//! In-memory [`ChainReader`] for tests.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::ChainReader;
use crate::error::{ReadFailure, ReadKind, ReadResult};

#[derive(Debug, Default, Clone)]
struct MockValues {
    price_quote: U256,
    allowance: U256,
    native_balance: U256,
    token_balance: U256,
    total_supply: U256,
    failing: HashSet<ReadKind>,
    delay: Duration,
}

#[derive(Debug, Default)]
pub struct MockChainReader {
    values: Mutex<MockValues>,
    calls: AtomicUsize,
}

impl MockChainReader {
    pub fn set_price_quote(&self, value: U256) {
        self.values.lock().unwrap().price_quote = value;
    }

    pub fn set_allowance(&self, value: U256) {
        self.values.lock().unwrap().allowance = value;
    }

    pub fn set_native_balance(&self, value: U256) {
        self.values.lock().unwrap().native_balance = value;
    }

    pub fn set_token_balance(&self, value: U256) {
        self.values.lock().unwrap().token_balance = value;
    }

    pub fn set_total_supply(&self, value: U256) {
        self.values.lock().unwrap().total_supply = value;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.values.lock().unwrap().delay = delay;
    }

    pub fn fail(&self, read: ReadKind) {
        self.values.lock().unwrap().failing.insert(read);
    }

    pub fn heal(&self, read: ReadKind) {
        self.values.lock().unwrap().failing.remove(&read);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn read(&self, read: ReadKind, pick: fn(&MockValues) -> U256) -> ReadResult<U256> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.values.lock().unwrap().delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let values = self.values.lock().unwrap().clone();
        if values.failing.contains(&read) {
            return Err(ReadFailure::Transport { read, message: "connection reset".into() });
        }
        Ok(pick(&values))
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn price_quote(&self, _unit_amount: U256) -> ReadResult<U256> {
        self.read(ReadKind::PriceQuote, |v| v.price_quote).await
    }

    async fn allowance(&self, _owner: Address, _spender: Address) -> ReadResult<U256> {
        self.read(ReadKind::Allowance, |v| v.allowance).await
    }

    async fn native_balance(&self, _account: Address) -> ReadResult<U256> {
        self.read(ReadKind::NativeBalance, |v| v.native_balance).await
    }

    async fn token_balance(&self, _account: Address) -> ReadResult<U256> {
        self.read(ReadKind::TokenBalance, |v| v.token_balance).await
    }

    async fn total_supply(&self) -> ReadResult<U256> {
        self.read(ReadKind::TotalSupply, |v| v.total_supply).await
    }
}
