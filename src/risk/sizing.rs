//! Position sizing from risk per trade, bounded by the configured amount.
//!
//! The risk size is `balance * risk_pct / 100 / |entry - stop|` base units.
//! The configured amount then applies:
//! - `fixed`: that many base units, replacing the risk size
//! - `percentage`: at most `balance * value / 100` quote, converted at entry
//! - `quote_fixed`: at most `value` quote, converted at entry
//!
//! Without a usable risk size the configured amount is used on its own.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const HUNDRED: Decimal = dec!(100);

/// How the configured trade amount is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountType {
    /// Base units
    #[default]
    Fixed,
    /// Percent of the quote balance
    Percentage,
    /// Quote currency
    QuoteFixed,
}

impl AmountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmountType::Fixed => "fixed",
            AmountType::Percentage => "percentage",
            AmountType::QuoteFixed => "quote_fixed",
        }
    }
}

impl fmt::Display for AmountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AmountType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(AmountType::Fixed),
            "percentage" | "percent" => Ok(AmountType::Percentage),
            "quote_fixed" | "quote" => Ok(AmountType::QuoteFixed),
            other => bail!("Unknown amount type: {}", other),
        }
    }
}

/// A configured trade amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountLimit {
    pub kind: AmountType,
    pub value: Decimal,
}

impl AmountLimit {
    /// `None` when `value` is not positive, which disables the setting.
    pub fn new(kind: AmountType, value: Decimal) -> Option<Self> {
        (value > Decimal::ZERO).then_some(Self { kind, value })
    }

    /// Base units this setting allows at `entry`.
    fn base_units(&self, balance: Decimal, entry: Decimal) -> Option<Decimal> {
        match self.kind {
            AmountType::Fixed => Some(self.value),
            AmountType::Percentage => self
                .value
                .checked_div(HUNDRED)?
                .checked_mul(balance)?
                .checked_div(entry),
            AmountType::QuoteFixed => self.value.checked_div(entry),
        }
    }
}

/// Position size in base units.
///
/// `None` (not computable) for a non-positive entry or stop, or a negative
/// balance. `Some(0)` when the stop sits on the entry or nothing yields a
/// positive size. Without a stop only the configured amount applies.
pub fn position_size(
    balance: Decimal,
    risk_pct: Decimal,
    entry: Decimal,
    stop_loss: Option<Decimal>,
    limit: Option<AmountLimit>,
) -> Option<Decimal> {
    if entry <= Decimal::ZERO || stop_loss.is_some_and(|s| s <= Decimal::ZERO) {
        warn!(entry = %entry, stop_loss = ?stop_loss, "Position size not computable");
        return None;
    }
    if balance < Decimal::ZERO {
        warn!(balance = %balance, "Position size not computable for a negative balance");
        return None;
    }

    let mut risk_size = None;
    if let Some(stop) = stop_loss {
        let per_unit = entry.checked_sub(stop)?.abs();
        if per_unit.is_zero() {
            debug!(entry = %entry, "Stop sits on entry; nothing to risk");
            return Some(Decimal::ZERO);
        }
        if risk_pct > Decimal::ZERO {
            risk_size = risk_pct
                .checked_div(HUNDRED)
                .and_then(|r| r.checked_mul(balance))
                .and_then(|quote| quote.checked_div(per_unit))
                .filter(|size| *size > Decimal::ZERO);
        }
    }

    let allowed = limit.and_then(|l| {
        l.base_units(balance, entry)
            .filter(|units| *units > Decimal::ZERO)
            .map(|units| (l.kind, units))
    });

    let size = match (risk_size, allowed) {
        (Some(risk), Some((kind, cap))) if kind != AmountType::Fixed => risk.min(cap),
        (_, Some((_, units))) => units,
        (Some(risk), None) => risk,
        (None, None) => {
            debug!(balance = %balance, risk_pct = %risk_pct, "No position size configured");
            Decimal::ZERO
        }
    };

    debug!(
        balance = %balance,
        entry = %entry,
        stop_loss = ?stop_loss,
        risk_size = ?risk_size,
        size = %size,
        "Position sized"
    );
    Some(size)
}
