//! Buy/sell quotes against the bonding curve
//!
//! Both directions are biased against the trader by 1%:
//! - buys start integrating from the supply at which the price is 1% above the
//!   current marginal price
//! - sells pay out 99% of the area under the curve
//!
//! so a quote never promises more than the contract will grant if the price moves a
//! little between quoting and execution.

use alloy_primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::math::{
    cbrt, cost_to_move_supply, ensure_non_negative, price_at_supply, supply_at_price, CURVE_SCALE,
};
use crate::chain::ChainReader;
use crate::error::{DomainError, DomainResult, QuoteError, ReadFailure, ReadKind};
use crate::units::wei_to_decimal;

/// Price multiplier applied to the starting point of a buy (+1%).
pub const BUY_MARGIN: Decimal = Decimal::from_parts(101, 0, 0, false, 2);

/// Payout multiplier applied to sell proceeds (-1%).
pub const SELL_HAIRCUT: Decimal = Decimal::from_parts(99, 0, 0, false, 2);

const BPS_DENOMINATOR: u32 = 10_000;

/// Result of evaluating a trade against the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Lower end of the supply interval the trade moves through
    pub supply_bottom: Decimal,
    /// Upper end of the supply interval the trade moves through
    pub supply_top: Decimal,
    /// NOM received for a buy, ETH received for a sell
    pub amount_out: Decimal,
}

impl Quote {
    fn empty(supply: Decimal) -> Self {
        Self { supply_bottom: supply, supply_top: supply, amount_out: Decimal::ZERO }
    }

    /// Minimum output to accept under a slippage tolerance in basis points.
    pub fn min_amount_out(&self, slippage_bps: u32) -> DomainResult<Decimal> {
        if slippage_bps > BPS_DENOMINATOR {
            return Err(DomainError::InvalidSlippage(slippage_bps));
        }
        let keep = Decimal::from(BPS_DENOMINATOR - slippage_bps) / Decimal::from(BPS_DENOMINATOR);
        self.amount_out.checked_mul(keep).ok_or(DomainError::Overflow("minimum output"))
    }
}

/// How much NOM `payment_amount` ETH buys at `current_supply`.
pub fn quote_buy(payment_amount: Decimal, current_supply: Decimal) -> DomainResult<Quote> {
    ensure_non_negative("payment", payment_amount)?;
    ensure_non_negative("supply", current_supply)?;
    if payment_amount.is_zero() {
        return Ok(Quote::empty(current_supply));
    }

    let price = price_at_supply(current_supply)?;
    let price_bottom = price.checked_mul(BUY_MARGIN).ok_or(DomainError::Overflow("buy margin"))?;
    let supply_bottom = supply_at_price(price_bottom)?;

    // supply_top = a * cbrt(3 * payment / a + (supply_bottom / a)^3)
    let normalized_bottom = supply_bottom
        .checked_div(CURVE_SCALE)
        .ok_or(DomainError::Overflow("buy integral"))?;
    let bottom_cubed = normalized_bottom
        .checked_mul(normalized_bottom)
        .and_then(|sq| sq.checked_mul(normalized_bottom))
        .ok_or(DomainError::Overflow("buy integral"))?;
    let payment_term = payment_amount
        .checked_mul(Decimal::from(3))
        .and_then(|tripled| tripled.checked_div(CURVE_SCALE))
        .ok_or(DomainError::Overflow("buy integral"))?;
    let radicand = payment_term
        .checked_add(bottom_cubed)
        .ok_or(DomainError::Overflow("buy integral"))?;
    if radicand.is_sign_negative() {
        return Err(DomainError::NegativeRadicand(radicand));
    }

    let supply_top = cbrt(radicand)?
        .checked_mul(CURVE_SCALE)
        .ok_or(DomainError::Overflow("buy integral"))?
        .max(supply_bottom);
    let amount_out = supply_top - supply_bottom;

    trace!(%payment_amount, %current_supply, %supply_bottom, %supply_top, "buy quote");
    Ok(Quote { supply_bottom, supply_top, amount_out })
}

/// Buy quote for what is left of `payment_amount` once `gas_fee` (ETH) is paid.
pub fn quote_buy_net_of_fee(
    payment_amount: Decimal,
    gas_fee: Decimal,
    current_supply: Decimal,
) -> DomainResult<Quote> {
    ensure_non_negative("payment", payment_amount)?;
    ensure_non_negative("gas fee", gas_fee)?;
    if gas_fee > payment_amount {
        return Err(DomainError::FeeExceedsPayment { fee: gas_fee, payment: payment_amount });
    }
    debug!(%payment_amount, %gas_fee, "Quoting buy net of gas");
    quote_buy(payment_amount - gas_fee, current_supply)
}

/// How much ETH selling `sell_amount` NOM at `current_supply` pays out.
pub fn quote_sell(sell_amount: Decimal, current_supply: Decimal) -> DomainResult<Quote> {
    ensure_non_negative("sell amount", sell_amount)?;
    ensure_non_negative("supply", current_supply)?;
    if sell_amount > current_supply {
        return Err(DomainError::InsufficientSupply { sell_amount, supply: current_supply });
    }

    let supply_bottom = current_supply - sell_amount;
    let proceeds = cost_to_move_supply(supply_bottom, current_supply)?;
    let amount_out = proceeds.checked_mul(SELL_HAIRCUT).ok_or(DomainError::Overflow("sell haircut"))?;

    trace!(%sell_amount, %current_supply, %amount_out, "sell quote");
    Ok(Quote { supply_bottom, supply_top: current_supply, amount_out })
}

/// Quotes against the live supply, read from chain at call time.
pub struct LiveQuoter<R> {
    reader: R,
}

impl<R: ChainReader> LiveQuoter<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    async fn current_supply(&self) -> Result<Decimal, QuoteError> {
        let raw: U256 = self.reader.total_supply().await?;
        let supply = wei_to_decimal(raw)
            .map_err(|e| ReadFailure::decode(ReadKind::TotalSupply, e.to_string()))?;
        debug!(%supply, "Fetched live supply for quote");
        Ok(supply)
    }

    pub async fn quote_buy_live(&self, payment_amount: Decimal) -> Result<Quote, QuoteError> {
        // Validate before spending a round trip.
        ensure_non_negative("payment", payment_amount)?;
        let supply = self.current_supply().await?;
        Ok(quote_buy(payment_amount, supply)?)
    }

    pub async fn quote_buy_net_live(
        &self,
        payment_amount: Decimal,
        gas_fee: Decimal,
    ) -> Result<Quote, QuoteError> {
        ensure_non_negative("payment", payment_amount)?;
        let supply = self.current_supply().await?;
        Ok(quote_buy_net_of_fee(payment_amount, gas_fee, supply)?)
    }

    pub async fn quote_sell_live(&self, sell_amount: Decimal) -> Result<Quote, QuoteError> {
        ensure_non_negative("sell amount", sell_amount)?;
        let supply = self.current_supply().await?;
        Ok(quote_sell(sell_amount, supply)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainReader;
    use crate::units::decimal_to_wei;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_zero_payment_buys_nothing() {
        for supply in ["0", "1", "12345678.9"] {
            let q = quote_buy(Decimal::ZERO, d(supply)).unwrap();
            assert_eq!(q.amount_out, Decimal::ZERO);
            assert_eq!(q.supply_bottom, d(supply));
            assert_eq!(q.supply_top, d(supply));
        }
    }

    #[test]
    fn test_zero_sell_pays_nothing() {
        let q = quote_sell(Decimal::ZERO, d("5000000")).unwrap();
        assert_eq!(q.amount_out, Decimal::ZERO);
        assert_eq!(q.supply_bottom, d("5000000"));
        assert_eq!(q.supply_top, d("5000000"));
    }

    #[test]
    fn test_buy_from_empty_curve() {
        // a/3 ETH buys the first `a` tokens
        let q = quote_buy(d("33333333.33"), Decimal::ZERO).unwrap();
        assert_eq!(q.supply_bottom, Decimal::ZERO);
        assert!((q.amount_out - d("100000000")).abs() < d("0.01"), "got {}", q.amount_out);
        assert!(q.amount_out < d("100000000"));
    }

    #[test]
    fn test_buy_margin_starts_above_current_supply() {
        let supply = d("20000000");
        let q = quote_buy(d("1"), supply).unwrap();
        assert!(q.supply_bottom > supply);
        assert!(q.supply_top > q.supply_bottom);
        let price_bottom = price_at_supply(q.supply_bottom).unwrap();
        let expected = price_at_supply(supply).unwrap() * BUY_MARGIN;
        assert!((price_bottom - expected).abs() < d("0.000000000000000001"));
    }

    #[test]
    fn test_buy_never_beats_margin_free_integral() {
        let supply = d("20000000");
        let payment = d("10");
        let q = quote_buy(payment, supply).unwrap();
        // Paying for the quoted tokens from the unmargined start costs less than `payment`.
        let cost = cost_to_move_supply(supply, supply + q.amount_out).unwrap();
        assert!(cost < payment);
    }

    #[test]
    fn test_buy_integral_matches_payment() {
        let payment = d("2.5");
        let q = quote_buy(payment, d("30000000")).unwrap();
        let cost = cost_to_move_supply(q.supply_bottom, q.supply_top).unwrap();
        assert!((cost - payment).abs() < d("0.000000001"), "cost {cost} vs {payment}");
    }

    #[test]
    fn test_sell_more_than_supply_fails() {
        let err = quote_sell(d("100.5"), d("100")).unwrap_err();
        assert_eq!(err, DomainError::InsufficientSupply { sell_amount: d("100.5"), supply: d("100") });
    }

    #[test]
    fn test_sell_applies_haircut() {
        let supply = d("40000000");
        let q = quote_sell(d("1000"), supply).unwrap();
        let raw = cost_to_move_supply(d("39999000"), supply).unwrap();
        assert_eq!(q.supply_bottom, d("39999000"));
        assert_eq!(q.supply_top, supply);
        assert_eq!(q.amount_out, raw * SELL_HAIRCUT);
    }

    #[test]
    fn test_sell_entire_supply() {
        let q = quote_sell(CURVE_SCALE, CURVE_SCALE).unwrap();
        assert_eq!(q.supply_bottom, Decimal::ZERO);
        assert!((q.amount_out - d("33000000")).abs() < d("0.000001"));
    }

    #[test]
    fn test_round_trip_loses_value() {
        for (payment, supply) in [("0.01", "1000000"), ("1", "20000000"), ("5", "75000000")] {
            let x = d(payment);
            let buy = quote_buy(x, d(supply)).unwrap();
            let sell = quote_sell(buy.amount_out, buy.supply_top).unwrap();
            assert!(sell.amount_out < x, "round trip returned {} for {}", sell.amount_out, x);
        }
    }

    #[test]
    fn test_negative_inputs_rejected() {
        assert!(matches!(quote_buy(d("-1"), d("10")), Err(DomainError::Negative { .. })));
        assert!(matches!(quote_sell(d("-1"), d("10")), Err(DomainError::Negative { .. })));
        assert!(matches!(quote_buy(d("1"), d("-10")), Err(DomainError::Negative { .. })));
    }

    #[test]
    fn test_min_amount_out() {
        let q = Quote { supply_bottom: d("1"), supply_top: d("201"), amount_out: d("200") };
        assert_eq!(q.min_amount_out(100).unwrap(), d("198"));
        assert_eq!(q.min_amount_out(0).unwrap(), d("200"));
        assert_eq!(q.min_amount_out(10_000).unwrap(), Decimal::ZERO);
        assert_eq!(q.min_amount_out(10_001), Err(DomainError::InvalidSlippage(10_001)));
    }

    #[test]
    fn test_buy_net_of_fee_spends_the_rest() {
        let supply = d("20000000");
        let q = quote_buy_net_of_fee(d("1"), d("0.003"), supply).unwrap();
        assert_eq!(q, quote_buy(d("0.997"), supply).unwrap());
        assert!(q.amount_out < quote_buy(d("1"), supply).unwrap().amount_out);
    }

    #[test]
    fn test_fee_equal_to_payment_buys_nothing() {
        let q = quote_buy_net_of_fee(d("0.003"), d("0.003"), d("20000000")).unwrap();
        assert_eq!(q.amount_out, Decimal::ZERO);
    }

    #[test]
    fn test_fee_above_payment_rejected() {
        let err = quote_buy_net_of_fee(d("0.001"), d("0.003"), d("20000000")).unwrap_err();
        assert_eq!(err, DomainError::FeeExceedsPayment { fee: d("0.003"), payment: d("0.001") });
        assert!(matches!(
            quote_buy_net_of_fee(d("1"), d("-0.1"), d("20000000")),
            Err(DomainError::Negative { .. })
        ));
    }

    #[tokio::test]
    async fn test_live_net_quote_uses_fresh_supply() {
        let reader = MockChainReader::default();
        reader.set_total_supply(decimal_to_wei(d("20000000")).unwrap());
        let quoter = LiveQuoter::new(reader);

        let live = quoter.quote_buy_net_live(d("1"), d("0.003")).await.unwrap();
        assert_eq!(live, quote_buy(d("0.997"), d("20000000")).unwrap());
    }

    #[tokio::test]
    async fn test_live_quote_uses_fresh_supply() {
        let reader = MockChainReader::default();
        reader.set_total_supply(decimal_to_wei(d("20000000")).unwrap());
        let quoter = LiveQuoter::new(reader);

        let live = quoter.quote_buy_live(d("1")).await.unwrap();
        assert_eq!(live, quote_buy(d("1"), d("20000000")).unwrap());

        let live = quoter.quote_sell_live(d("1000")).await.unwrap();
        assert_eq!(live, quote_sell(d("1000"), d("20000000")).unwrap());
    }

    #[tokio::test]
    async fn test_live_quote_surfaces_read_failure() {
        let reader = MockChainReader::default();
        reader.fail(ReadKind::TotalSupply);
        let quoter = LiveQuoter::new(reader);

        let err = quoter.quote_buy_live(d("1")).await.unwrap_err();
        assert!(matches!(err, QuoteError::Read(ReadFailure::Transport { read: ReadKind::TotalSupply, .. })));
    }

    #[tokio::test]
    async fn test_live_quote_rejects_bad_input_without_reading() {
        let reader = MockChainReader::default();
        reader.fail(ReadKind::TotalSupply);
        let quoter = LiveQuoter::new(reader);

        let err = quoter.quote_sell_live(d("-3")).await.unwrap_err();
        assert!(matches!(err, QuoteError::Domain(DomainError::Negative { .. })));
    }
}
