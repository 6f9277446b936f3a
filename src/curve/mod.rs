//! Bonding curve pricing
//!
//! Pure math over the quadratic curve plus the quote engine built on top of it.

pub mod math;
pub mod quote;

pub use math::{
    cbrt, cost_to_move_supply, price_at_supply, price_curve, supply_at_price, CurvePoint,
    CURVE_SCALE,
};
pub use quote::{quote_buy, quote_buy_net_of_fee, quote_sell, LiveQuoter, Quote, BUY_MARGIN, SELL_HAIRCUT};
