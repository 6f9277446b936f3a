//! Error taxonomy
//!
//! - [`DomainError`]: invalid input to the curve math or the quote engine. Local to the
//!   rejected request, never touches shared state.
//! - [`ReadFailure`]: one external read failed. Aborts the whole sync cycle.
//! - [`ConfigError`]: missing or invalid startup configuration. Fatal.

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Invalid mathematical input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A quantity that must be non-negative was negative.
    #[error("{what} cannot be negative (got {value})")]
    Negative { what: &'static str, value: Decimal },

    /// Selling more tokens than the curve has issued.
    #[error("cannot sell {sell_amount} with only {supply} in circulation")]
    InsufficientSupply { sell_amount: Decimal, supply: Decimal },

    /// The cube-root radicand of a buy quote went negative.
    #[error("negative radicand {0} while solving the buy integral")]
    NegativeRadicand(Decimal),

    /// An intermediate value left the representable decimal range.
    #[error("decimal overflow while computing {0}")]
    Overflow(&'static str),

    /// Curve sampling needs at least two points over a non-empty range.
    #[error("invalid curve range: {0}")]
    InvalidRange(String),

    /// The gas fee eats the whole payment of a buy.
    #[error("gas fee {fee} ETH exceeds payment of {payment} ETH")]
    FeeExceedsPayment { fee: Decimal, payment: Decimal },

    /// Slippage tolerance above 100%.
    #[error("slippage of {0} bps exceeds 10000 bps")]
    InvalidSlippage(u32),
}

/// Which read of the sync batch failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadKind {
    PriceQuote,
    Allowance,
    NativeBalance,
    TotalSupply,
    TokenBalance,
    GasTiers,
    BlockNumber,
}

impl fmt::Display for ReadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadKind::PriceQuote => write!(f, "price quote"),
            ReadKind::Allowance => write!(f, "allowance"),
            ReadKind::NativeBalance => write!(f, "native balance"),
            ReadKind::TotalSupply => write!(f, "total supply"),
            ReadKind::TokenBalance => write!(f, "token balance"),
            ReadKind::GasTiers => write!(f, "gas tiers"),
            ReadKind::BlockNumber => write!(f, "block number"),
        }
    }
}

/// A single external read failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadFailure {
    /// Network or node failure.
    #[error("{read} read failed: transport error: {message}")]
    Transport { read: ReadKind, message: String },

    /// The node answered with an error response (contract revert, bad call).
    #[error("{read} read failed: call reverted: {message}")]
    Revert { read: ReadKind, message: String },

    /// The response could not be decoded into the expected value.
    #[error("{read} read failed: undecodable response: {message}")]
    Decode { read: ReadKind, message: String },

    /// The read did not finish within the configured timeout.
    #[error("{read} read timed out after {millis} ms")]
    Timeout { read: ReadKind, millis: u64 },

    /// The fee-market feed returned nothing usable.
    #[error("gas feed failed: {0}")]
    GasFeed(String),
}

impl ReadFailure {
    pub fn read(&self) -> ReadKind {
        match self {
            ReadFailure::Transport { read, .. }
            | ReadFailure::Revert { read, .. }
            | ReadFailure::Decode { read, .. }
            | ReadFailure::Timeout { read, .. } => *read,
            ReadFailure::GasFeed(_) => ReadKind::GasTiers,
        }
    }

    pub fn decode(read: ReadKind, message: impl Into<String>) -> Self {
        ReadFailure::Decode { read, message: message.into() }
    }

    /// Classify an alloy transport error: error payloads from the node are reverts,
    /// everything else is a transport failure.
    pub fn from_transport(read: ReadKind, err: alloy_transport::TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => ReadFailure::Revert { read, message: payload.message.to_string() },
            None => ReadFailure::Transport { read, message: err.to_string() },
        }
    }
}

/// Startup configuration problem. Prevents the sync loop from starting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Failure of a live quote: either the supply read or the math.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuoteError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Read(#[from] ReadFailure),
}

pub type DomainResult<T> = Result<T, DomainError>;
pub type ReadResult<T> = Result<T, ReadFailure>;
