//! Decimal quantization and display.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::arithmetic::to_decimal;

/// Fallback text shown when a value cannot be formatted.
pub const NOT_AVAILABLE: &str = "N/A";

/// Largest scale `rust_decimal` can represent.
const MAX_DECIMALS: u32 = 28;

/// Caller-selected rounding rule. Truncation is `Down`, never implicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Ties away from zero
    #[default]
    HalfUp,
    /// Ties to the even neighbour
    HalfEven,
    /// Ties toward zero
    HalfDown,
    /// Toward zero
    Down,
    /// Away from zero
    Up,
    /// Toward negative infinity
    Floor,
    /// Toward positive infinity
    Ceiling,
}

impl RoundingMode {
    pub fn strategy(&self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::HalfDown => RoundingStrategy::MidpointTowardZero,
            RoundingMode::Down => RoundingStrategy::ToZero,
            RoundingMode::Up => RoundingStrategy::AwayFromZero,
            RoundingMode::Floor => RoundingStrategy::ToNegativeInfinity,
            RoundingMode::Ceiling => RoundingStrategy::ToPositiveInfinity,
        }
    }
}

impl FromStr for RoundingMode {
    type Err = anyhow::Error;

    /// Accepts `half_up`, `half-up`, `HALF_UP` and `ROUND_HALF_UP` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase().replace('-', "_");
        let name = upper.strip_prefix("ROUND_").unwrap_or(&upper);
        match name {
            "HALF_UP" => Ok(RoundingMode::HalfUp),
            "HALF_EVEN" => Ok(RoundingMode::HalfEven),
            "HALF_DOWN" => Ok(RoundingMode::HalfDown),
            "DOWN" => Ok(RoundingMode::Down),
            "UP" => Ok(RoundingMode::Up),
            "FLOOR" => Ok(RoundingMode::Floor),
            "CEILING" => Ok(RoundingMode::Ceiling),
            _ => Err(anyhow::anyhow!("unknown rounding mode '{}'", s)),
        }
    }
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundingMode::HalfUp => "half_up",
            RoundingMode::HalfEven => "half_even",
            RoundingMode::HalfDown => "half_down",
            RoundingMode::Down => "down",
            RoundingMode::Up => "up",
            RoundingMode::Floor => "floor",
            RoundingMode::Ceiling => "ceiling",
        };
        f.write_str(name)
    }
}

/// Round `value` to `decimals` fractional digits and render it padded to
/// exactly that many digits. Negative `decimals` behave as zero.
///
/// With `show_sign`, non-negative results get a leading `+`. A value that
/// rounds to zero is rendered without a minus sign.
pub fn quantize(value: Decimal, decimals: i32, rounding: RoundingMode, show_sign: bool) -> String {
    let dp = decimals.clamp(0, MAX_DECIMALS as i32) as u32;
    let mut rounded = value.round_dp_with_strategy(dp, rounding.strategy());
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }

    let body = format!("{:.*}", dp as usize, rounded);
    if show_sign && !rounded.is_sign_negative() {
        format!("+{}", body)
    } else {
        body
    }
}

/// `quantize` over raw text, returning `fallback` when the input is not a
/// decimal number.
pub fn quantize_str(raw: &str, decimals: i32, rounding: RoundingMode, show_sign: bool, fallback: &str) -> String {
    match to_decimal(raw) {
        Some(value) => quantize(value, decimals, rounding, show_sign),
        None => fallback.to_string(),
    }
}

/// `quantize` for an optional value, e.g. a price that may not be computable.
pub fn quantize_opt(value: Option<Decimal>, decimals: i32, rounding: RoundingMode, show_sign: bool, fallback: &str) -> String {
    value
        .map(|v| quantize(v, decimals, rounding, show_sign))
        .unwrap_or_else(|| fallback.to_string())
}
