//! Gas Price Oracle - Etherscan gas tracker with RPC fallback
//!
//! Produces the three gas tiers (Standard / Fast / Instant) shown next to every
//! trade. Tiers are always refreshed as a whole; if neither source answers the
//! fetch fails and the sync cycle that asked for it is dropped.
//!
//! API: https://api.etherscan.io/v2/api?chainid=1&module=gastracker&action=gasoracle

use alloy_provider::{Provider, ProviderBuilder};
use async_trait::async_trait;
use reqwest::{Client, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ConfigError, DomainError, DomainResult, ReadFailure, ReadResult};
use crate::units::{wei_to_gwei, GWEI_PER_ETH};

// ============================================
// CONSTANTS
// ============================================

/// Etherscan API base URL (v2 supports multiple chains)
const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Minimum sane gas price (0.01 gwei)
const MIN_GAS_GWEI: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum sane gas price (1000 gwei - during extreme congestion)
const MAX_GAS_GWEI: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Tier multipliers applied to a single RPC gas price
const RPC_FAST_MULTIPLIER: Decimal = Decimal::from_parts(12, 0, 0, false, 1);
const RPC_INSTANT_MULTIPLIER: Decimal = Decimal::from_parts(15, 0, 0, false, 1);

// ============================================
// API RESPONSE TYPES
// ============================================

#[derive(Debug, Deserialize)]
struct GasTrackerResponse {
    status: String,
    message: String,
    result: Option<GasTrackerResult>,
}

#[derive(Debug, Deserialize)]
struct GasTrackerResult {
    #[serde(rename = "SafeGasPrice")]
    safe_gas_price: Option<String>,
    #[serde(rename = "ProposeGasPrice")]
    propose_gas_price: Option<String>,
    #[serde(rename = "FastGasPrice")]
    fast_gas_price: Option<String>,
}

// ============================================
// GAS TIERS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GasTierKind {
    Standard,
    Fast,
    Instant,
}

impl GasTierKind {
    pub const ALL: [GasTierKind; 3] = [GasTierKind::Standard, GasTierKind::Fast, GasTierKind::Instant];
}

impl fmt::Display for GasTierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasTierKind::Standard => write!(f, "Standard"),
            GasTierKind::Fast => write!(f, "Fast"),
            GasTierKind::Instant => write!(f, "Instant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasTier {
    pub kind: GasTierKind,
    /// Price per gas unit in gwei
    pub gwei: Decimal,
    /// Display label, e.g. "23.5 (Fast)"
    pub label: String,
}

impl GasTier {
    pub fn new(kind: GasTierKind, gwei: Decimal) -> Self {
        let gwei = gwei.normalize();
        Self { kind, gwei, label: format!("{} ({})", gwei, kind) }
    }

    /// Fee in ETH for spending `gas_units` at this tier's price.
    pub fn fee_eth(&self, gas_units: u64) -> DomainResult<Decimal> {
        self.gwei
            .checked_mul(Decimal::from(gas_units))
            .and_then(|total_gwei| total_gwei.checked_div(Decimal::from(GWEI_PER_ETH)))
            .map(|fee| fee.normalize())
            .ok_or(DomainError::Overflow("gas fee"))
    }
}

/// Exactly three tiers, ordered Standard, Fast, Instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasTiers([GasTier; 3]);

impl GasTiers {
    pub fn new(standard: Decimal, fast: Decimal, instant: Decimal) -> Self {
        Self([
            GasTier::new(GasTierKind::Standard, standard),
            GasTier::new(GasTierKind::Fast, fast),
            GasTier::new(GasTierKind::Instant, instant),
        ])
    }

    pub fn zero() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
    }

    pub fn get(&self, kind: GasTierKind) -> &GasTier {
        match kind {
            GasTierKind::Standard => &self.0[0],
            GasTierKind::Fast => &self.0[1],
            GasTierKind::Instant => &self.0[2],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &GasTier> {
        self.0.iter()
    }

    /// Fee in ETH for `gas_units` at the chosen tier.
    pub fn fee_eth(&self, kind: GasTierKind, gas_units: u64) -> DomainResult<Decimal> {
        self.get(kind).fee_eth(gas_units)
    }
}

impl Default for GasTiers {
    fn default() -> Self {
        Self::zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasSource {
    Etherscan,
    RpcProvider,
}

impl fmt::Display for GasSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasSource::Etherscan => write!(f, "Etherscan"),
            GasSource::RpcProvider => write!(f, "RPC"),
        }
    }
}

fn clamp_gwei(gwei: Decimal) -> Decimal {
    gwei.clamp(MIN_GAS_GWEI, MAX_GAS_GWEI)
}

fn parse_gwei(field: &str, value: Option<String>) -> ReadResult<Decimal> {
    let raw = value.ok_or_else(|| ReadFailure::GasFeed(format!("missing {}", field)))?;
    let gwei = Decimal::from_str(raw.trim())
        .map_err(|e| ReadFailure::GasFeed(format!("bad {} '{}': {}", field, raw, e)))?;
    Ok(clamp_gwei(gwei))
}

fn tiers_from_tracker(response: GasTrackerResponse) -> ReadResult<GasTiers> {
    if response.status != "1" {
        return Err(ReadFailure::GasFeed(format!("gas tracker failed: {}", response.message)));
    }
    let result = response
        .result
        .ok_or_else(|| ReadFailure::GasFeed("no gas tracker result".into()))?;

    Ok(GasTiers::new(
        parse_gwei("SafeGasPrice", result.safe_gas_price)?,
        parse_gwei("ProposeGasPrice", result.propose_gas_price)?,
        parse_gwei("FastGasPrice", result.fast_gas_price)?,
    ))
}

fn tiers_from_gas_price(gas_price_wei: u128) -> ReadResult<GasTiers> {
    let gwei = wei_to_gwei(gas_price_wei).map_err(|e| ReadFailure::GasFeed(e.to_string()))?;
    let standard = clamp_gwei(gwei);
    Ok(GasTiers::new(
        standard,
        clamp_gwei(standard * RPC_FAST_MULTIPLIER),
        clamp_gwei(standard * RPC_INSTANT_MULTIPLIER),
    ))
}

// ============================================
// FEE-MARKET FETCH
// ============================================

#[async_trait]
pub trait GasTierSource: Send + Sync {
    async fn gas_tiers(&self) -> ReadResult<GasTiers>;
}

pub struct GasOracle {
    http_client: Client,
    api_key: Option<String>,
    chain_id: u64,
    rpc_url: Url,
}

impl GasOracle {
    pub fn new(
        api_key: Option<String>,
        chain_id: u64,
        rpc_url: Url,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid { key: "GAS_API_TIMEOUT_SECS", reason: e.to_string() })?;

        Ok(Self { http_client, api_key, chain_id, rpc_url })
    }

    /// Fetch gas tiers from the Etherscan gas tracker
    async fn fetch_from_etherscan(&self, api_key: &str) -> ReadResult<GasTiers> {
        let url = format!(
            "{}?chainid={}&module=gastracker&action=gasoracle&apikey={}",
            ETHERSCAN_API_URL,
            self.chain_id,
            api_key
        );

        let response: GasTrackerResponse = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ReadFailure::GasFeed(e.to_string()))?
            .json()
            .await
            .map_err(|e| ReadFailure::GasFeed(e.to_string()))?;

        tiers_from_tracker(response)
    }

    /// Derive gas tiers from the node's `eth_gasPrice`
    async fn fetch_from_rpc(&self) -> ReadResult<GasTiers> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());

        let gas_price_wei = provider
            .get_gas_price()
            .await
            .map_err(|e| ReadFailure::GasFeed(format!("eth_gasPrice: {}", e)))?;

        tiers_from_gas_price(gas_price_wei)
    }
}

#[async_trait]
impl GasTierSource for GasOracle {
    /// Etherscan first (if we have an API key), then RPC.
    async fn gas_tiers(&self) -> ReadResult<GasTiers> {
        if let Some(ref api_key) = self.api_key {
            match self.fetch_from_etherscan(api_key).await {
                Ok(tiers) => {
                    debug!(
                        "⛽ Gas from {}: {} / {} / {}",
                        GasSource::Etherscan,
                        tiers.get(GasTierKind::Standard).label,
                        tiers.get(GasTierKind::Fast).label,
                        tiers.get(GasTierKind::Instant).label
                    );
                    return Ok(tiers);
                }
                Err(e) => {
                    warn!("Etherscan gas fetch failed: {}", e);
                }
            }
        }

        let tiers = self.fetch_from_rpc().await?;
        debug!("⛽ Gas from {}: {}", GasSource::RpcProvider, tiers.get(GasTierKind::Standard).label);
        Ok(tiers)
    }
}

// ============================================
// TESTS
// ============================================
