//! Sync Loop
//!
//! Turns block notifications into snapshot updates. Each cycle fans out every read
//! at once, waits for all of them, and applies the batch only when the whole batch
//! resolved. One failed read discards the cycle and the previous snapshot stays.

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::store::{ChainSnapshot, ChainStateStore, SyncBatch};
use crate::chain::{BlockSource, ChainReader};
use crate::error::{ReadFailure, ReadKind, ReadResult};
use crate::gas_oracle::GasTierSource;
use crate::units::{wei_to_decimal, wei_to_decimal_saturating, ONE_TOKEN_WEI};

/// Result of handling one block notification.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// Every read succeeded and the new snapshot is live.
    Applied(Arc<ChainSnapshot>),
    /// The block was already processed successfully.
    Duplicate,
    /// The block is older than the last one processed.
    Stale,
    /// A read failed. Nothing was applied.
    Failed(ReadFailure),
}

impl SyncOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SyncOutcome::Applied(_))
    }
}

/// Counters since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub applied: u64,
    pub failed: u64,
    pub duplicate: u64,
    pub stale: u64,
}

#[derive(Debug, Default)]
struct Counters {
    applied: AtomicU64,
    failed: AtomicU64,
    duplicate: AtomicU64,
    stale: AtomicU64,
}

/// State guarded by the single-slot gate. Holding the lock means a sync is in flight.
#[derive(Debug, Default)]
struct GateState {
    last_processed: Option<u64>,
}

pub struct SyncLoop<R, G> {
    reader: R,
    gas: G,
    store: Arc<ChainStateStore>,
    owner: Address,
    bonding_contract: Address,
    read_timeout: Option<Duration>,
    gate: Mutex<GateState>,
    counters: Counters,
}

impl<R: ChainReader, G: GasTierSource> SyncLoop<R, G> {
    pub fn new(
        reader: R,
        gas: G,
        store: Arc<ChainStateStore>,
        owner: Address,
        bonding_contract: Address,
    ) -> Self {
        Self {
            reader,
            gas,
            store,
            owner,
            bonding_contract,
            read_timeout: None,
            gate: Mutex::new(GateState::default()),
            counters: Counters::default(),
        }
    }

    /// Bound every individual read. A read that runs over fails the cycle.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn store(&self) -> &Arc<ChainStateStore> {
        &self.store
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            applied: self.counters.applied.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            duplicate: self.counters.duplicate.load(Ordering::Relaxed),
            stale: self.counters.stale.load(Ordering::Relaxed),
        }
    }

    /// Last block whose batch was applied.
    pub async fn last_processed(&self) -> Option<u64> {
        self.gate.lock().await.last_processed
    }

    /// Handle a new-block notification.
    ///
    /// Attempts are serialized: a call arriving while a cycle runs waits for it, then
    /// re-checks the block against the one just processed, so a queued call for an
    /// older block never moves the snapshot backwards. A failed block is not
    /// recorded, so the next notification for it runs a fresh cycle.
    pub async fn on_block(&self, block_number: u64) -> SyncOutcome {
        let mut gate = self.gate.lock().await;

        match gate.last_processed {
            Some(last) if last == block_number => {
                self.counters.duplicate.fetch_add(1, Ordering::Relaxed);
                debug!("Block {} already synced, skipping", block_number);
                return SyncOutcome::Duplicate;
            }
            Some(last) if block_number < last => {
                self.counters.stale.fetch_add(1, Ordering::Relaxed);
                debug!("Block {} is behind synced block {}, skipping", block_number, last);
                return SyncOutcome::Stale;
            }
            _ => {}
        }

        match self.fetch_batch(block_number).await {
            Ok(batch) => {
                let snapshot = self.store.apply(batch);
                gate.last_processed = Some(block_number);
                self.counters.applied.fetch_add(1, Ordering::Relaxed);
                info!(
                    "Synced block {} (v{}): price {} | supply {} | balance {} ETH",
                    snapshot.block_number,
                    snapshot.version,
                    snapshot.current_price,
                    snapshot.supply,
                    snapshot.native_balance
                );
                SyncOutcome::Applied(snapshot)
            }
            Err(failure) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!("Sync for block {} discarded: {}", block_number, failure);
                SyncOutcome::Failed(failure)
            }
        }
    }

    /// Subscribe to `source` and sync every block it announces until `shutdown`
    /// flips or its sender is dropped. Blocks announced during a cycle collapse
    /// into the latest one.
    pub async fn run<B>(&self, source: &B, mut shutdown: watch::Receiver<bool>)
    where
        B: BlockSource + ?Sized,
    {
        let (sink, mut blocks) = watch::channel(0u64);
        let subscription = source.subscribe(sink);
        info!("Sync loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = blocks.changed() => {
                    if changed.is_err() {
                        warn!("Block source closed");
                        break;
                    }
                    let block_number = *blocks.borrow_and_update();
                    self.on_block(block_number).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        drop(subscription);
        let stats = self.stats();
        info!(
            "Sync loop stopped: {} applied, {} failed, {} duplicate, {} stale",
            stats.applied, stats.failed, stats.duplicate, stats.stale
        );
    }

    async fn fetch_batch(&self, block_number: u64) -> ReadResult<SyncBatch> {
        let unit = U256::from(ONE_TOKEN_WEI);

        let (price, allowance, native_balance, supply, token_balance, gas_tiers) = futures::try_join!(
            self.read_amount(ReadKind::PriceQuote, self.reader.price_quote(unit)),
            self.read_allowance(),
            self.read_amount(ReadKind::NativeBalance, self.reader.native_balance(self.owner)),
            self.read_amount(ReadKind::TotalSupply, self.reader.total_supply()),
            self.read_amount(ReadKind::TokenBalance, self.reader.token_balance(self.owner)),
            self.timed(ReadKind::GasTiers, self.gas.gas_tiers()),
        )?;

        Ok(SyncBatch {
            block_number,
            price,
            inverse_price: inverse_price(price),
            allowance,
            native_balance,
            token_balance,
            supply,
            gas_tiers,
        })
    }

    async fn read_amount<F>(&self, read: ReadKind, fut: F) -> ReadResult<Decimal>
    where
        F: Future<Output = ReadResult<U256>>,
    {
        let raw = self.timed(read, fut).await?;
        wei_to_decimal(raw).map_err(|e| ReadFailure::decode(read, e.to_string()))
    }

    /// Unlimited approvals exceed the decimal range and saturate instead of failing.
    async fn read_allowance(&self) -> ReadResult<Decimal> {
        let read = ReadKind::Allowance;
        let raw = self.timed(read, self.reader.allowance(self.owner, self.bonding_contract)).await?;
        Ok(wei_to_decimal_saturating(raw))
    }

    async fn timed<T, F>(&self, read: ReadKind, fut: F) -> ReadResult<T>
    where
        F: Future<Output = ReadResult<T>>,
    {
        match self.read_timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                ReadFailure::Timeout { read, millis: limit.as_millis() as u64 }
            })?,
            None => fut.await,
        }
    }
}

/// ETH per token. Zero while nothing is quoted.
fn inverse_price(price: Decimal) -> Decimal {
    if price.is_zero() {
        return Decimal::ZERO;
    }
    Decimal::ONE.checked_div(price).unwrap_or(Decimal::ZERO).normalize()
}
