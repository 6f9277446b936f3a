//! Chain adapters
//!
//! Read provider and block notifications, the two external collaborators the sync
//! loop is driven by.

mod blocks;
mod reader;

#[cfg(test)]
mod mock;

pub use blocks::{publish_block, BlockSource, BlockSubscription, PollingBlockSource};
pub use reader::{ChainReader, IBondingNom, IERC20, RpcChainReader};

#[cfg(test)]
pub(crate) use mock::MockChainReader;
