//! Chain-state synchronization: the snapshot store and the loop that feeds it.

mod store;
mod sync_loop;

pub use store::{ChainSnapshot, ChainStateStore, SyncBatch};
pub use sync_loop::{SyncLoop, SyncOutcome, SyncStats};
