//! Stop-loss, take-profit and P&L arithmetic.
//!
//! Prices that cannot be derived are reported as `None` ("not computable"),
//! never as zero. P&L on zero exposure is a legitimate zero.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use crate::models::TradeSide;

const HUNDRED: Decimal = dec!(100);

/// Parse a loosely formatted number: surrounding whitespace, a comma
/// decimal separator and scientific notation are accepted.
pub fn to_decimal(raw: &str) -> Option<Decimal> {
    let normalized = raw.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }

    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .map_err(|e| debug!(value = %raw, error = %e, "Value is not a decimal"))
        .ok()
}

/// Inputs for deriving a protective or target price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskRequest {
    pub entry_price: Decimal,
    /// Percent of entry, e.g. `2` for 2%
    pub percentage: Decimal,
    pub side: TradeSide,
}

impl RiskRequest {
    pub fn new(entry_price: Decimal, percentage: Decimal, side: TradeSide) -> Self {
        Self {
            entry_price,
            percentage,
            side,
        }
    }

    /// Build a request from raw text; any unparseable field yields `None`.
    pub fn parse(entry_price: &str, percentage: &str, side: &str) -> Option<Self> {
        let entry = to_decimal(entry_price);
        let pct = to_decimal(percentage);
        let side = TradeSide::from_str(side).ok();

        match (entry, pct, side) {
            (Some(entry), Some(pct), Some(side)) => Some(Self::new(entry, pct, side)),
            _ => {
                warn!(
                    entry = %entry_price,
                    percentage = %percentage,
                    side = %side_label(side),
                    "Invalid risk inputs"
                );
                None
            }
        }
    }

    pub fn stop_loss_price(&self) -> Option<Decimal> {
        stop_loss_price(self.entry_price, self.percentage, self.side)
    }

    pub fn take_profit_price(&self) -> Option<Decimal> {
        take_profit_price(self.entry_price, self.percentage, self.side)
    }
}

fn side_label(side: Option<TradeSide>) -> &'static str {
    side.map(|s| s.as_str()).unwrap_or("invalid")
}

/// `entry * (1 + sign * pct / 100)`, guarded for non-positive inputs and a
/// negative result.
fn offset_price(entry: Decimal, pct: Decimal, sign: Decimal) -> Option<Decimal> {
    if entry <= Decimal::ZERO || pct <= Decimal::ZERO {
        debug!(entry = %entry, percentage = %pct, "Offset price not computable");
        return None;
    }

    let multiplier = pct.checked_div(HUNDRED)?;
    let factor = Decimal::ONE.checked_add(sign.checked_mul(multiplier)?)?;
    let price = entry.checked_mul(factor)?;

    if price < Decimal::ZERO {
        warn!(entry = %entry, percentage = %pct, price = %price, "Derived price is negative");
        return None;
    }

    Some(price)
}

/// Stop-loss below entry for longs, above for shorts.
pub fn stop_loss_price(entry: Decimal, pct: Decimal, side: TradeSide) -> Option<Decimal> {
    match side {
        TradeSide::Buy => offset_price(entry, pct, Decimal::NEGATIVE_ONE),
        TradeSide::Sell => offset_price(entry, pct, Decimal::ONE),
    }
}

/// Take-profit above entry for longs, below for shorts.
pub fn take_profit_price(entry: Decimal, pct: Decimal, side: TradeSide) -> Option<Decimal> {
    match side {
        TradeSide::Buy => offset_price(entry, pct, Decimal::ONE),
        TradeSide::Sell => offset_price(entry, pct, Decimal::NEGATIVE_ONE),
    }
}

/// Realized or unrealized P&L in quote currency.
///
/// Zero when the amount or either price is non-positive, or when the result
/// does not fit in a `Decimal`.
pub fn pnl(entry: Decimal, current: Decimal, filled_amount: Decimal, side: TradeSide) -> Decimal {
    checked_pnl(entry, current, filled_amount, side).unwrap_or_else(|| {
        warn!(entry = %entry, current = %current, amount = %filled_amount, "P&L overflows");
        Decimal::ZERO
    })
}

/// `pnl` over raw text. Unparseable input is not computable (`None`),
/// which is distinct from the zero returned for degenerate amounts. A result
/// out of `Decimal` range is not computable either.
pub fn pnl_from_str(entry: &str, current: &str, filled_amount: &str, side: TradeSide) -> Option<Decimal> {
    let (Some(e), Some(c), Some(a)) = (to_decimal(entry), to_decimal(current), to_decimal(filled_amount)) else {
        warn!(entry = %entry, current = %current, amount = %filled_amount, "Invalid P&L inputs");
        return None;
    };

    let result = checked_pnl(e, c, a, side);
    if result.is_none() {
        warn!(entry = %entry, current = %current, amount = %filled_amount, "P&L overflows");
    }
    result
}

/// `None` only on overflow.
fn checked_pnl(entry: Decimal, current: Decimal, filled_amount: Decimal, side: TradeSide) -> Option<Decimal> {
    if filled_amount <= Decimal::ZERO || entry <= Decimal::ZERO || current <= Decimal::ZERO {
        debug!(
            entry = %entry,
            current = %current,
            amount = %filled_amount,
            "P&L skipped for non-positive input"
        );
        return Some(Decimal::ZERO);
    }

    let move_per_unit = match side {
        TradeSide::Buy => current.checked_sub(entry)?,
        TradeSide::Sell => entry.checked_sub(current)?,
    };
    move_per_unit.checked_mul(filled_amount)
}

/// Return on entry for the side (0.1 = 10%). Zero for a non-positive entry
/// or an out-of-range result.
pub fn return_pct(entry: Decimal, exit: Decimal, side: TradeSide) -> Decimal {
    if entry <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let move_per_unit = match side {
        TradeSide::Buy => exit.checked_sub(entry),
        TradeSide::Sell => entry.checked_sub(exit),
    };
    move_per_unit
        .and_then(|m| m.checked_div(entry))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_decimal() {
        assert_eq!(to_decimal("123.45"), Some(dec!(123.45)));
        assert_eq!(to_decimal(" 123,45 "), Some(dec!(123.45)));
        assert_eq!(to_decimal("-0.001"), Some(dec!(-0.001)));
        assert_eq!(to_decimal("1e-3"), Some(dec!(0.001)));
        assert_eq!(to_decimal("abc"), None);
        assert_eq!(to_decimal(""), None);
    }

    #[test]
    fn test_stop_loss() {
        assert_eq!(stop_loss_price(dec!(100), dec!(2), TradeSide::Buy), Some(dec!(98)));
        assert_eq!(stop_loss_price(dec!(100), dec!(2), TradeSide::Sell), Some(dec!(102)));
        assert_eq!(stop_loss_price(dec!(100), dec!(0), TradeSide::Buy), None);
        assert_eq!(stop_loss_price(dec!(-5), dec!(2), TradeSide::Buy), None);
        assert_eq!(stop_loss_price(dec!(50000), dec!(2.5), TradeSide::Buy), Some(dec!(48750)));
    }

    #[test]
    fn test_stop_loss_negative_result_not_computable() {
        // 110% below entry would be a negative price
        assert_eq!(stop_loss_price(dec!(1), dec!(110), TradeSide::Buy), None);
        assert_eq!(stop_loss_price(dec!(100), dec!(-1), TradeSide::Sell), None);
    }

    #[test]
    fn test_take_profit() {
        assert_eq!(take_profit_price(dec!(100), dec!(4), TradeSide::Buy), Some(dec!(104)));
        assert_eq!(take_profit_price(dec!(100), dec!(4), TradeSide::Sell), Some(dec!(96)));
        assert_eq!(take_profit_price(dec!(48000), dec!(5), TradeSide::Sell), Some(dec!(45600)));
        assert_eq!(take_profit_price(dec!(1), dec!(110), TradeSide::Sell), None);
        assert_eq!(take_profit_price(dec!(100), dec!(0), TradeSide::Buy), None);
    }

    #[test]
    fn test_pnl() {
        assert_eq!(pnl(dec!(100), dec!(110), dec!(2), TradeSide::Buy), dec!(20));
        assert_eq!(pnl(dec!(100), dec!(90), dec!(2), TradeSide::Sell), dec!(20));
        assert_eq!(pnl(dec!(100), dec!(110), dec!(0), TradeSide::Buy), dec!(0));
        assert_eq!(pnl(dec!(50000), dec!(49000), dec!(0.1), TradeSide::Buy), dec!(-100));
        assert_eq!(pnl(dec!(0), dec!(60000), dec!(0.1), TradeSide::Buy), dec!(0));
    }

    #[test]
    fn test_pnl_from_str_distinguishes_unparseable() {
        assert_eq!(pnl_from_str("100", "110", "2", TradeSide::Buy), Some(dec!(20)));
        assert_eq!(pnl_from_str("100", "110", "0", TradeSide::Buy), Some(Decimal::ZERO));
        assert_eq!(pnl_from_str("100", "n/a", "2", TradeSide::Buy), None);
    }

    #[test]
    fn test_pnl_out_of_range_does_not_panic() {
        let max = "79228162514264337593543950335";
        assert_eq!(pnl_from_str("1", max, "2", TradeSide::Buy), None);
        assert_eq!(pnl_from_str(max, "1", "2", TradeSide::Buy), None);
        assert_eq!(pnl_from_str("1", max, "2", TradeSide::Sell), None);
        // Within range the same magnitudes still compute
        assert_eq!(pnl_from_str("1", max, "0.5", TradeSide::Buy), Some((Decimal::MAX - Decimal::ONE) * dec!(0.5)));

        assert_eq!(pnl(Decimal::ONE, Decimal::MAX, dec!(2), TradeSide::Buy), Decimal::ZERO);
        assert_eq!(return_pct(dec!(0.0000001), Decimal::MAX, TradeSide::Buy), Decimal::ZERO);
    }

    #[test]
    fn test_risk_request_parse() {
        let req = RiskRequest::parse("50000.0", "2,5", "BUY").unwrap();
        assert_eq!(req.stop_loss_price(), Some(dec!(48750)));
        assert_eq!(req.take_profit_price(), Some(dec!(51250)));

        assert!(RiskRequest::parse("50000", "abc", "buy").is_none());
        assert!(RiskRequest::parse("50000", "2", "hold").is_none());
    }

    #[test]
    fn test_return_pct() {
        assert_eq!(return_pct(dec!(100), dec!(110), TradeSide::Buy), dec!(0.1));
        assert_eq!(return_pct(dec!(100), dec!(110), TradeSide::Sell), dec!(-0.1));
        assert_eq!(return_pct(dec!(0), dec!(110), TradeSide::Buy), dec!(0));
    }
}
