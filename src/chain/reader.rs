//! Chain reads for the bonding market
//!
//! One `eth_call` per contract read, built from the `sol!` interfaces below.
//! Every failure is classified into a [`ReadFailure`] tagged with the read it
//! belongs to, so the sync loop can log exactly what broke a cycle.

use alloy_primitives::{Address, Bytes, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use reqwest::Url;
use std::sync::Arc;
use tracing::trace;

use crate::error::{ReadFailure, ReadKind, ReadResult};

// ============================================
// SOLIDITY INTERFACES
// ============================================

sol! {
    /// NOM bonding curve contract
    #[derive(Debug)]
    interface IBondingNom {
        function buyQuoteETH(uint256 amountETH) external view returns (uint256);
        function getSupplyNOM() external view returns (uint256);
    }

    /// NOM token (ERC-20 subset)
    #[derive(Debug)]
    interface IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
    }
}

// ============================================
// READ PROVIDER
// ============================================

/// The on-chain values the sync loop and the live quoter need.
///
/// All amounts are 18-decimal wei.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Tokens the bonding contract quotes for `unit_amount` wei of ETH.
    async fn price_quote(&self, unit_amount: U256) -> ReadResult<U256>;

    /// Token allowance `owner` granted to `spender`.
    async fn allowance(&self, owner: Address, spender: Address) -> ReadResult<U256>;

    /// ETH balance of `account`.
    async fn native_balance(&self, account: Address) -> ReadResult<U256>;

    /// Token balance of `account`.
    async fn token_balance(&self, account: Address) -> ReadResult<U256>;

    /// Tokens issued by the bonding curve.
    async fn total_supply(&self) -> ReadResult<U256>;
}

#[async_trait]
impl<T: ChainReader + ?Sized> ChainReader for Arc<T> {
    async fn price_quote(&self, unit_amount: U256) -> ReadResult<U256> {
        (**self).price_quote(unit_amount).await
    }

    async fn allowance(&self, owner: Address, spender: Address) -> ReadResult<U256> {
        (**self).allowance(owner, spender).await
    }

    async fn native_balance(&self, account: Address) -> ReadResult<U256> {
        (**self).native_balance(account).await
    }

    async fn token_balance(&self, account: Address) -> ReadResult<U256> {
        (**self).token_balance(account).await
    }

    async fn total_supply(&self) -> ReadResult<U256> {
        (**self).total_supply().await
    }
}

/// [`ChainReader`] over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcChainReader {
    rpc_url: Url,
    bonding_contract: Address,
    token_contract: Address,
}

impl RpcChainReader {
    pub fn new(rpc_url: Url, bonding_contract: Address, token_contract: Address) -> Self {
        Self { rpc_url, bonding_contract, token_contract }
    }

    async fn call_contract(&self, read: ReadKind, to: Address, calldata: Vec<u8>) -> ReadResult<Bytes> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());

        let tx = TransactionRequest::default()
            .to(to)
            .input(calldata.into());

        let output = provider
            .call(tx)
            .await
            .map_err(|e| ReadFailure::from_transport(read, e))?;

        trace!("{} eth_call returned {} bytes", read, output.len());
        Ok(output)
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn price_quote(&self, unit_amount: U256) -> ReadResult<U256> {
        let read = ReadKind::PriceQuote;
        let calldata = IBondingNom::buyQuoteETHCall { amountETH: unit_amount }.abi_encode();
        let output = self.call_contract(read, self.bonding_contract, calldata).await?;

        IBondingNom::buyQuoteETHCall::abi_decode_returns(&output)
            .map_err(|e| ReadFailure::decode(read, e.to_string()))
    }

    async fn allowance(&self, owner: Address, spender: Address) -> ReadResult<U256> {
        let read = ReadKind::Allowance;
        let calldata = IERC20::allowanceCall { owner, spender }.abi_encode();
        let output = self.call_contract(read, self.token_contract, calldata).await?;

        IERC20::allowanceCall::abi_decode_returns(&output)
            .map_err(|e| ReadFailure::decode(read, e.to_string()))
    }

    async fn native_balance(&self, account: Address) -> ReadResult<U256> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());

        provider
            .get_balance(account)
            .await
            .map_err(|e| ReadFailure::from_transport(ReadKind::NativeBalance, e))
    }

    async fn token_balance(&self, account: Address) -> ReadResult<U256> {
        let read = ReadKind::TokenBalance;
        let calldata = IERC20::balanceOfCall { account }.abi_encode();
        let output = self.call_contract(read, self.token_contract, calldata).await?;

        IERC20::balanceOfCall::abi_decode_returns(&output)
            .map_err(|e| ReadFailure::decode(read, e.to_string()))
    }

    async fn total_supply(&self) -> ReadResult<U256> {
        let read = ReadKind::TotalSupply;
        let calldata = IBondingNom::getSupplyNOMCall {}.abi_encode();
        let output = self.call_contract(read, self.bonding_contract, calldata).await?;

        IBondingNom::getSupplyNOMCall::abi_decode_returns(&output)
            .map_err(|e| ReadFailure::decode(read, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolValue;

    #[test]
    fn test_buy_quote_selector() {
        let calldata = IBondingNom::buyQuoteETHCall { amountETH: U256::from(1u64) }.abi_encode();
        assert_eq!(calldata.len(), 4 + 32);
        assert_eq!(&calldata[..4], &IBondingNom::buyQuoteETHCall::SELECTOR);
    }

    #[test]
    fn test_decode_supply_return() {
        let supply = U256::from(123_456_789u64);
        let encoded = supply.abi_encode();
        let decoded = IBondingNom::getSupplyNOMCall::abi_decode_returns(&encoded).unwrap();
        assert_eq!(decoded, supply);
    }

    #[test]
    fn test_short_return_is_decode_failure() {
        let read = ReadKind::TokenBalance;
        let err = IERC20::balanceOfCall::abi_decode_returns(&[0u8; 3])
            .map_err(|e| ReadFailure::decode(read, e.to_string()))
            .unwrap_err();
        assert_eq!(err.read(), ReadKind::TokenBalance);
        assert!(matches!(err, ReadFailure::Decode { .. }));
    }
}
