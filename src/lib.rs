//! nomsync
//!
//! Quote engine for the NOM quadratic bonding curve and the block-driven sync loop
//! that keeps a consistent snapshot of the on-chain state it prices against.

pub mod chain;
pub mod config;
pub mod curve;
pub mod error;
pub mod gas_oracle;
pub mod sync;
pub mod units;

pub use config::Config;
pub use error::{ConfigError, DomainError, QuoteError, ReadFailure, ReadKind};
