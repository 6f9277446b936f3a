//! New-block notifications
//!
//! A [`BlockSource`] publishes block numbers into a single-slot `watch` channel.
//! Only the latest block matters, so a slow consumer sees the newest number and
//! never a backlog. The returned [`BlockSubscription`] owns the producer task and
//! stops it when dropped.

use alloy_provider::{Provider, ProviderBuilder};
use reqwest::Url;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{ReadFailure, ReadKind, ReadResult};

/// Emits block numbers.
pub trait BlockSource: Send + Sync {
    /// Start publishing into `sink`. Publishing stops when the subscription is dropped
    /// or every receiver of `sink` is gone.
    fn subscribe(&self, sink: watch::Sender<u64>) -> BlockSubscription;
}

/// Live subscription to a [`BlockSource`].
#[must_use = "dropping the subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct BlockSubscription {
    task: JoinHandle<()>,
}

impl BlockSubscription {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for BlockSubscription {
    fn drop(&mut self) {
        self.task.abort();
        debug!("Block subscription released");
    }
}

/// Publish `block` unless it is already the latest one. Returns whether it was new.
pub fn publish_block(sink: &watch::Sender<u64>, block: u64) -> bool {
    sink.send_if_modified(|latest| {
        if *latest == block {
            false
        } else {
            *latest = block;
            true
        }
    })
}

/// Polls `eth_blockNumber` on a fixed interval.
#[derive(Debug, Clone)]
pub struct PollingBlockSource {
    rpc_url: Url,
    interval: Duration,
}

impl PollingBlockSource {
    pub fn new(rpc_url: Url, interval: Duration) -> Self {
        Self { rpc_url, interval }
    }

    async fn block_number(rpc_url: &Url) -> ReadResult<u64> {
        let provider = ProviderBuilder::new().connect_http(rpc_url.clone());
        provider
            .get_block_number()
            .await
            .map_err(|e| ReadFailure::from_transport(ReadKind::BlockNumber, e))
    }
}

impl BlockSource for PollingBlockSource {
    fn subscribe(&self, sink: watch::Sender<u64>) -> BlockSubscription {
        let rpc_url = self.rpc_url.clone();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let task = tokio::spawn(async move {
            loop {
                ticker.tick().await;
                if sink.is_closed() {
                    debug!("No block listeners left, stopping poller");
                    break;
                }
                match Self::block_number(&rpc_url).await {
                    Ok(block) => {
                        if publish_block(&sink, block) {
                            trace!("New block {}", block);
                        }
                    }
                    Err(e) => warn!("Block poll failed: {}", e),
                }
            }
        });

        BlockSubscription::new(task)
    }
}
