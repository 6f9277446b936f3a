//! Chain State Store
//!
//! Holds the one authoritative [`ChainSnapshot`]. A snapshot is never edited in
//! place: [`ChainSnapshot::next`] builds its successor from a fully resolved
//! [`SyncBatch`], and [`ChainStateStore::apply`] publishes it with a single pointer
//! swap. A reader therefore holds either the whole old snapshot or the whole new one.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::gas_oracle::GasTiers;

/// Everything one successful sync cycle read, for one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBatch {
    pub block_number: u64,
    /// Tokens quoted for one ETH
    pub price: Decimal,
    /// ETH per token, zero while `price` is zero
    pub inverse_price: Decimal,
    pub allowance: Decimal,
    pub native_balance: Decimal,
    pub token_balance: Decimal,
    pub supply: Decimal,
    pub gas_tiers: GasTiers,
}

/// On-chain derived state as of one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub block_number: u64,
    pub current_price: Decimal,
    pub current_inverse_price: Decimal,
    /// Saturates at `Decimal::MAX` for unlimited approvals
    pub allowance: Decimal,
    pub native_balance: Decimal,
    pub token_balance: Decimal,
    pub supply: Decimal,
    pub gas_tiers: GasTiers,
    /// Number of batches applied so far
    pub version: u64,
    pub synced_at: Option<DateTime<Utc>>,
}

impl ChainSnapshot {
    /// The startup snapshot: all zeros, nothing synced yet.
    pub fn empty() -> Self {
        Self {
            block_number: 0,
            current_price: Decimal::ZERO,
            current_inverse_price: Decimal::ZERO,
            allowance: Decimal::ZERO,
            native_balance: Decimal::ZERO,
            token_balance: Decimal::ZERO,
            supply: Decimal::ZERO,
            gas_tiers: GasTiers::zero(),
            version: 0,
            synced_at: None,
        }
    }

    /// Successor of `self` after applying `batch`. Every chain-derived field comes
    /// from the batch; only the version counter carries over.
    pub fn next(&self, batch: SyncBatch, synced_at: DateTime<Utc>) -> Self {
        Self {
            block_number: batch.block_number,
            current_price: batch.price,
            current_inverse_price: batch.inverse_price,
            allowance: batch.allowance,
            native_balance: batch.native_balance,
            token_balance: batch.token_balance,
            supply: batch.supply,
            gas_tiers: batch.gas_tiers,
            version: self.version + 1,
            synced_at: Some(synced_at),
        }
    }

    pub fn is_synced(&self) -> bool {
        self.version > 0
    }

    /// True when selling `amount` needs a larger allowance for the bonding contract first.
    pub fn needs_approval(&self, amount: Decimal) -> bool {
        self.allowance < amount
    }
}

impl Default for ChainSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Owner of the current snapshot.
#[derive(Debug)]
pub struct ChainStateStore {
    current: watch::Sender<Arc<ChainSnapshot>>,
}

impl ChainStateStore {
    pub fn new() -> Self {
        let (current, _) = watch::channel(Arc::new(ChainSnapshot::empty()));
        Self { current }
    }

    /// Latest fully applied snapshot.
    pub fn current(&self) -> Arc<ChainSnapshot> {
        self.current.borrow().clone()
    }

    /// Receiver that wakes on every applied batch.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ChainSnapshot>> {
        self.current.subscribe()
    }

    /// Replace the snapshot with its successor for `batch`.
    ///
    /// The successor is built before the swap, so the write lock is held only for
    /// the pointer exchange.
    pub fn apply(&self, batch: SyncBatch) -> Arc<ChainSnapshot> {
        let previous = self.current();
        let next = Arc::new(previous.next(batch, Utc::now()));
        self.current.send_replace(next.clone());
        debug!(
            "Applied snapshot v{} at block {} (was v{} at block {})",
            next.version, next.block_number, previous.version, previous.block_number
        );
        next
    }
}

impl Default for ChainStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn batch(block_number: u64) -> SyncBatch {
        SyncBatch {
            block_number,
            price: Decimal::from(2500),
            inverse_price: Decimal::from_str("0.0004").unwrap(),
            allowance: Decimal::from(50),
            native_balance: Decimal::from_str("1.5").unwrap(),
            token_balance: Decimal::from(1200),
            supply: Decimal::from(20_000_000),
            gas_tiers: GasTiers::new(Decimal::from(10), Decimal::from(12), Decimal::from(15)),
        }
    }

    #[test]
    fn test_starts_empty() {
        let store = ChainStateStore::new();
        let snapshot = store.current();
        assert_eq!(*snapshot, ChainSnapshot::empty());
        assert!(!snapshot.is_synced());
        assert_eq!(snapshot.gas_tiers, GasTiers::zero());
    }

    #[test]
    fn test_next_replaces_every_field() {
        let old = ChainSnapshot::empty();
        let at = Utc::now();
        let new = old.next(batch(7), at);

        assert_eq!(new.block_number, 7);
        assert_eq!(new.current_price, Decimal::from(2500));
        assert_eq!(new.current_inverse_price, Decimal::from_str("0.0004").unwrap());
        assert_eq!(new.allowance, Decimal::from(50));
        assert_eq!(new.native_balance, Decimal::from_str("1.5").unwrap());
        assert_eq!(new.token_balance, Decimal::from(1200));
        assert_eq!(new.supply, Decimal::from(20_000_000));
        assert_eq!(new.gas_tiers, batch(7).gas_tiers);
        assert_eq!(new.version, 1);
        assert_eq!(new.synced_at, Some(at));
        // The old snapshot is untouched.
        assert_eq!(old, ChainSnapshot::empty());
    }

    #[test]
    fn test_apply_swaps_whole_snapshot() {
        let store = ChainStateStore::new();
        let before = store.current();

        store.apply(batch(100));
        let after = store.current();

        // A reader holding the old Arc keeps seeing the old state.
        assert_eq!(before.block_number, 0);
        assert_eq!(after.block_number, 100);
        assert_eq!(after.version, 1);

        store.apply(batch(101));
        assert_eq!(store.current().version, 2);
        assert_eq!(after.block_number, 100);
    }

    #[tokio::test]
    async fn test_subscribers_see_applied_snapshots() {
        let store = ChainStateStore::new();
        let mut rx = store.subscribe();

        store.apply(batch(5));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().block_number, 5);
    }

    #[test]
    fn test_needs_approval() {
        let snapshot = ChainSnapshot::empty().next(batch(1), Utc::now());
        assert!(!snapshot.needs_approval(Decimal::from(50)));
        assert!(snapshot.needs_approval(Decimal::from(51)));

        let unlimited = SyncBatch { allowance: Decimal::MAX, ..batch(2) };
        let snapshot = snapshot.next(unlimited, Utc::now());
        assert!(!snapshot.needs_approval(Decimal::from(u64::MAX)));
    }
}
