//! Configuration for nomsync
//!
//! Endpoint, contract addresses and timing knobs for the sync loop. Loaded from
//! the environment (and `.env`) or a TOML file, then checked once by
//! [`Config::validate`] before anything talks to the chain.

use alloy_primitives::Address;
use eyre::Result;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

// ============================================
// MAIN CONFIGURATION
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Network Settings ==========
    /// JSON-RPC endpoint used for every read
    pub rpc_url: String,

    /// Chain ID (1 = Ethereum Mainnet), also passed to the gas tracker
    pub chain_id: u64,

    // ========== Contracts ==========
    /// Bonding curve contract (quotes, supply, allowance spender)
    pub bonding_contract_address: Option<String>,

    /// NOM ERC-20 token
    pub token_contract_address: Option<String>,

    // ========== Account ==========
    /// Account whose balances and allowance are tracked
    pub account_address: Option<String>,

    // ========== Timing ==========
    /// Per-read timeout inside a sync cycle, 0 disables it
    pub read_timeout_secs: u64,

    /// How often the block poller asks for the chain head
    pub block_poll_interval_ms: u64,

    // ========== API Keys ==========
    /// Etherscan API key for the gas tracker. Without it gas tiers come from the node.
    pub etherscan_api_key: Option<String>,

    /// HTTP timeout for the gas tracker
    pub gas_api_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Ok(Self {
            // Network
            rpc_url: env::var("RPC_URL").unwrap_or_default(),
            chain_id: env::var("CHAIN_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.chain_id),

            // Contracts
            bonding_contract_address: non_empty_var("BONDING_CONTRACT_ADDRESS"),
            token_contract_address: non_empty_var("TOKEN_CONTRACT_ADDRESS"),

            // Account
            account_address: non_empty_var("ACCOUNT_ADDRESS"),

            // Timing
            read_timeout_secs: env::var("READ_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.read_timeout_secs),
            block_poll_interval_ms: env::var("BLOCK_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.block_poll_interval_ms),

            // API Keys
            etherscan_api_key: non_empty_var("ETHERSCAN_API_KEY"),
            gas_api_timeout_secs: env::var("GAS_API_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.gas_api_timeout_secs),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check everything the sync loop needs before it starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rpc_endpoint()?;
        self.bonding_contract()?;
        self.token_contract()?;
        self.account()?;

        if self.block_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "BLOCK_POLL_INTERVAL_MS",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.gas_api_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "GAS_API_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    pub fn rpc_endpoint(&self) -> Result<Url, ConfigError> {
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::Missing("RPC_URL"));
        }
        if self.rpc_url.contains("YOUR_API_KEY") {
            return Err(ConfigError::Invalid {
                key: "RPC_URL",
                reason: "still contains the YOUR_API_KEY placeholder".to_string(),
            });
        }
        let url = Url::parse(self.rpc_url.trim())
            .map_err(|e| ConfigError::Invalid { key: "RPC_URL", reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Invalid {
                key: "RPC_URL",
                reason: format!("unsupported scheme '{}'", other),
            }),
        }
    }

    pub fn bonding_contract(&self) -> Result<Address, ConfigError> {
        parse_address("BONDING_CONTRACT_ADDRESS", self.bonding_contract_address.as_deref())
    }

    pub fn token_contract(&self) -> Result<Address, ConfigError> {
        parse_address("TOKEN_CONTRACT_ADDRESS", self.token_contract_address.as_deref())
    }

    pub fn account(&self) -> Result<Address, ConfigError> {
        parse_address("ACCOUNT_ADDRESS", self.account_address.as_deref())
    }

    /// `None` when the timeout is disabled
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }

    pub fn block_poll_interval(&self) -> Duration {
        Duration::from_millis(self.block_poll_interval_ms)
    }

    pub fn gas_api_timeout(&self) -> Duration {
        Duration::from_secs(self.gas_api_timeout_secs)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let or_unset = |value: &Option<String>| value.clone().unwrap_or_else(|| "✗ Not Set".to_string());
        let read_timeout = match self.read_timeout() {
            Some(timeout) => format!("{}s", timeout.as_secs()),
            None => "disabled".to_string(),
        };

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║                 NOMSYNC - CONFIGURATION                    ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Chain ID:          {:^40} ║", self.chain_id);
        println!("║ RPC:               {:^40} ║", redact_url(&self.rpc_url));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ CONTRACTS                                                  ║");
        println!("║ • Bonding:   {:^46} ║", or_unset(&self.bonding_contract_address));
        println!("║ • Token:     {:^46} ║", or_unset(&self.token_contract_address));
        println!("║ • Account:   {:^46} ║", or_unset(&self.account_address));
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ SYNC                                                       ║");
        println!("║ • Block Poll:      {:>37} ms ║", self.block_poll_interval_ms);
        println!("║ • Read Timeout:    {:^40} ║", read_timeout);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ GAS ORACLE                                                 ║");
        println!("║ • Etherscan API:   {:^40} ║",
            if self.etherscan_api_key.is_some() { "✓ Configured" } else { "✗ Using RPC" }
        );
        println!("║ • API Timeout:     {:>39}s ║", self.gas_api_timeout_secs);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            chain_id: 1,
            bonding_contract_address: None,
            token_contract_address: None,
            account_address: None,
            read_timeout_secs: 10,
            block_poll_interval_ms: 4000,
            etherscan_api_key: None,
            gas_api_timeout_secs: 5,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn parse_address(key: &'static str, value: Option<&str>) -> Result<Address, ConfigError> {
    let raw = value.map(str::trim).filter(|s| !s.is_empty()).ok_or(ConfigError::Missing(key))?;
    Address::from_str(raw).map_err(|e| ConfigError::Invalid { key, reason: e.to_string() })
}

/// Hide path and query, which is where providers put API keys.
fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => match url.host_str() {
            Some(host) => format!("{}://{}/…", url.scheme(), host),
            None => "✗ Invalid".to_string(),
        },
        Err(_) if raw.is_empty() => "✗ Not Set".to_string(),
        Err(_) => "✗ Invalid".to_string(),
    }
}

// ============================================
// TESTS
// ============================================
