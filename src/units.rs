//! Wei <-> decimal conversion
//!
//! Every on-chain amount handled here (ETH, NOM, allowance) is an 18-decimal
//! fixed-point integer. The curve math works on [`Decimal`], so values crossing the
//! chain boundary go through these two functions and nowhere else.

use alloy_primitives::U256;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Fractional digits of the on-chain fixed-point representation.
pub const TOKEN_DECIMALS: u32 = 18;

/// 10^18 wei, i.e. one whole token.
pub const ONE_TOKEN_WEI: u128 = 1_000_000_000_000_000_000;

/// 10^9 gwei, i.e. one ETH.
pub const GWEI_PER_ETH: u64 = 1_000_000_000;

/// Convert an 18-decimal integer into a decimal token amount.
///
/// Fails when the value exceeds the 96-bit decimal mantissa (about 7.9e10 tokens).
pub fn wei_to_decimal(wei: U256) -> DomainResult<Decimal> {
    scaled_to_decimal(wei, TOKEN_DECIMALS)
}

/// Like [`wei_to_decimal`], but values beyond the decimal range become [`Decimal::MAX`].
///
/// Meant for allowances, where `U256::MAX` is the usual "unlimited" approval.
pub fn wei_to_decimal_saturating(wei: U256) -> Decimal {
    wei_to_decimal(wei).unwrap_or(Decimal::MAX)
}

/// Convert a gas price in wei into gwei.
pub fn wei_to_gwei(wei: u128) -> DomainResult<Decimal> {
    scaled_to_decimal(U256::from(wei), 9)
}

fn scaled_to_decimal(raw: U256, scale: u32) -> DomainResult<Decimal> {
    let raw = u128::try_from(raw).map_err(|_| DomainError::Overflow("wei to decimal"))?;
    let raw = i128::try_from(raw).map_err(|_| DomainError::Overflow("wei to decimal"))?;
    let value = Decimal::try_from_i128_with_scale(raw, scale)
        .map_err(|_| DomainError::Overflow("wei to decimal"))?;
    Ok(value.normalize())
}

/// Convert a decimal token amount into 18-decimal wei, truncating sub-wei digits.
pub fn decimal_to_wei(amount: Decimal) -> DomainResult<U256> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(DomainError::Negative { what: "amount", value: amount });
    }
    let truncated = amount.round_dp_with_strategy(TOKEN_DECIMALS, RoundingStrategy::ToZero);
    let mantissa = u128::try_from(truncated.mantissa())
        .map_err(|_| DomainError::Overflow("decimal to wei"))?;
    let factor = 10u128.pow(TOKEN_DECIMALS - truncated.scale());
    let wei = U256::from(mantissa)
        .checked_mul(U256::from(factor))
        .ok_or(DomainError::Overflow("decimal to wei"))?;
    Ok(wei)
}
