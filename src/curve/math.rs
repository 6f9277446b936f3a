//! Quadratic bonding curve
//!
//! price(s) = (s / a)^2
//! s(price) = sqrt(price) * a
//! cost(l, h) = integral of price over [l, h] = (a / 3) * ((h / a)^3 - (l / a)^3)
//!
//! All functions are pure and work on [`Decimal`] so amounts keep the full 18-decimal
//! precision of the on-chain representation at any realistic supply.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Supply normalization constant `a` of the curve.
pub const CURVE_SCALE: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// Newton iterations are capped; from an f64 seed two or three are enough.
const MAX_NEWTON_ITERATIONS: usize = 64;

/// Convergence threshold for the cube root.
const NEWTON_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 26);

/// One sample of the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub supply: Decimal,
    pub price: Decimal,
}

pub(crate) fn ensure_non_negative(what: &'static str, value: Decimal) -> DomainResult<()> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(DomainError::Negative { what, value });
    }
    Ok(())
}

fn mul(lhs: Decimal, rhs: Decimal, what: &'static str) -> DomainResult<Decimal> {
    lhs.checked_mul(rhs).ok_or(DomainError::Overflow(what))
}

fn div(lhs: Decimal, rhs: Decimal, what: &'static str) -> DomainResult<Decimal> {
    lhs.checked_div(rhs).ok_or(DomainError::Overflow(what))
}

fn cube(value: Decimal, what: &'static str) -> DomainResult<Decimal> {
    mul(mul(value, value, what)?, value, what)
}

/// Marginal price at `supply`.
pub fn price_at_supply(supply: Decimal) -> DomainResult<Decimal> {
    ensure_non_negative("supply", supply)?;
    let normalized = div(supply, CURVE_SCALE, "price at supply")?;
    mul(normalized, normalized, "price at supply")
}

/// Supply at which the marginal price equals `price`.
pub fn supply_at_price(price: Decimal) -> DomainResult<Decimal> {
    ensure_non_negative("price", price)?;
    let root = price.sqrt().ok_or(DomainError::Overflow("supply at price"))?;
    mul(root, CURVE_SCALE, "supply at price")
}

/// Amount of base asset needed to move supply from `supply_low` to `supply_high`.
///
/// Negative when `supply_high < supply_low`; callers that need a cost pass the
/// endpoints in order.
pub fn cost_to_move_supply(supply_low: Decimal, supply_high: Decimal) -> DomainResult<Decimal> {
    ensure_non_negative("supply", supply_low)?;
    ensure_non_negative("supply", supply_high)?;
    if supply_low == supply_high {
        return Ok(Decimal::ZERO);
    }

    let high = cube(div(supply_high, CURVE_SCALE, "curve integral")?, "curve integral")?;
    let low = cube(div(supply_low, CURVE_SCALE, "curve integral")?, "curve integral")?;
    let area = mul(high - low, CURVE_SCALE, "curve integral")?;
    div(area, Decimal::from(3), "curve integral")
}

/// Real cube root of a non-negative decimal.
pub fn cbrt(value: Decimal) -> DomainResult<Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(DomainError::NegativeRadicand(value));
    }
    if value.is_zero() {
        return Ok(Decimal::ZERO);
    }

    let seed = value
        .to_f64()
        .map(f64::cbrt)
        .and_then(Decimal::from_f64)
        .filter(|s| !s.is_zero())
        .unwrap_or(Decimal::ONE);

    let three = Decimal::from(3);
    let mut root = seed;
    for _ in 0..MAX_NEWTON_ITERATIONS {
        // x' = (2x + v / x^2) / 3
        let squared = mul(root, root, "cube root")?;
        let next = div(root + root + div(value, squared, "cube root")?, three, "cube root")?;
        let delta = (next - root).abs();
        root = next;
        if delta <= NEWTON_EPSILON {
            break;
        }
    }
    Ok(root)
}

/// Evenly spaced samples of the curve over `[supply_from, supply_to]`, both ends included.
pub fn price_curve(
    supply_from: Decimal,
    supply_to: Decimal,
    samples: usize,
) -> DomainResult<Vec<CurvePoint>> {
    ensure_non_negative("supply", supply_from)?;
    if samples < 2 {
        return Err(DomainError::InvalidRange(format!("need at least 2 samples, got {samples}")));
    }
    if supply_to < supply_from {
        return Err(DomainError::InvalidRange(format!(
            "range end {supply_to} is below start {supply_from}"
        )));
    }

    let intervals = Decimal::from((samples - 1) as u64);
    let step = div(supply_to - supply_from, intervals, "curve sampling")?;

    let mut points = Vec::with_capacity(samples);
    for i in 0..samples {
        let supply = if i == samples - 1 {
            supply_to
        } else {
            supply_from + mul(step, Decimal::from(i as u64), "curve sampling")?
        };
        points.push(CurvePoint { supply, price: price_at_supply(supply)? });
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn assert_close(actual: Decimal, expected: Decimal, tolerance: Decimal) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} ± {tolerance}, got {actual}"
        );
    }

    #[test]
    fn test_price_at_zero_supply() {
        assert_eq!(price_at_supply(Decimal::ZERO).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_price_at_scale_is_one() {
        assert_eq!(price_at_supply(CURVE_SCALE).unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_price_strictly_increasing() {
        let supplies = ["0.000001", "1", "1000", "2500000.5", "50000000", "100000000", "350000000"];
        let prices: Vec<Decimal> =
            supplies.iter().map(|s| price_at_supply(d(s)).unwrap()).collect();
        for pair in prices.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_price_supply_round_trip() {
        for p in ["0", "0.0001", "0.25", "1", "2", "17.3", "1234.5678"] {
            let price = d(p);
            let back = price_at_supply(supply_at_price(price).unwrap()).unwrap();
            assert_close(back, price, d("0.0000000000000000001"));
        }
    }

    #[test]
    fn test_supply_price_round_trip() {
        let supply = d("42424242.424242424242424242");
        let back = supply_at_price(price_at_supply(supply).unwrap()).unwrap();
        assert_close(back, supply, d("0.000000000000000001"));
    }

    #[test]
    fn test_cost_of_empty_range_is_zero() {
        for s in ["0", "1", "99999999.999999999999999999"] {
            assert_eq!(cost_to_move_supply(d(s), d(s)).unwrap(), Decimal::ZERO);
        }
    }

    #[test]
    fn test_cost_from_zero_to_scale() {
        let cost = cost_to_move_supply(Decimal::ZERO, CURVE_SCALE).unwrap();
        assert_close(cost, d("33333333.333333333333333333"), d("0.000000000000000001"));
    }

    #[test]
    fn test_cost_monotonic_in_both_endpoints() {
        let low = d("1000000");
        let mut previous = Decimal::ZERO;
        for high in ["1000001", "2000000", "50000000", "120000000"] {
            let cost = cost_to_move_supply(low, d(high)).unwrap();
            assert!(cost > previous);
            previous = cost;
        }

        let high = d("90000000");
        let mut previous = cost_to_move_supply(Decimal::ZERO, high).unwrap();
        for low in ["1", "5000000", "60000000", "89999999"] {
            let cost = cost_to_move_supply(d(low), high).unwrap();
            assert!(cost < previous);
            previous = cost;
        }
    }

    #[test]
    fn test_negative_inputs_rejected() {
        assert!(matches!(
            price_at_supply(Decimal::NEGATIVE_ONE),
            Err(DomainError::Negative { what: "supply", .. })
        ));
        assert!(matches!(
            supply_at_price(d("-0.5")),
            Err(DomainError::Negative { what: "price", .. })
        ));
        assert!(cost_to_move_supply(Decimal::NEGATIVE_ONE, Decimal::ONE).is_err());
    }

    #[test]
    fn test_cbrt() {
        assert_eq!(cbrt(Decimal::ZERO).unwrap(), Decimal::ZERO);
        assert_close(cbrt(d("27")).unwrap(), d("3"), d("0.00000000000000000001"));
        assert_close(cbrt(d("0.001")).unwrap(), d("0.1"), d("0.00000000000000000001"));
        assert_close(
            cbrt(d("2")).unwrap(),
            d("1.2599210498948731647672106073"),
            d("0.0000000000000000000001"),
        );
        assert!(matches!(cbrt(d("-8")), Err(DomainError::NegativeRadicand(_))));
    }

    #[test]
    fn test_price_curve_endpoints() {
        let points = price_curve(d("1000000"), d("2000000"), 11).unwrap();
        assert_eq!(points.len(), 11);
        assert_eq!(points[0].supply, d("1000000"));
        assert_eq!(points[10].supply, d("2000000"));
        assert_eq!(points[0].price, price_at_supply(d("1000000")).unwrap());
        assert_eq!(points[10].price, price_at_supply(d("2000000")).unwrap());
        assert_eq!(points[5].supply, d("1500000"));
    }

    #[test]
    fn test_price_curve_rejects_bad_ranges() {
        assert!(matches!(price_curve(d("1"), d("2"), 1), Err(DomainError::InvalidRange(_))));
        assert!(matches!(price_curve(d("2"), d("1"), 5), Err(DomainError::InvalidRange(_))));
    }
}
