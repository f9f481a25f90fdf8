//! Chart timeframes in TradingView notation.
//!
//! A bare integer is a number of minutes (`"60"`, `"240"`). Suffixes select
//! larger or smaller units: `S` seconds, `D` days, `W` weeks, with an
//! optional leading multiplier (`"D"` == `"1D"`). Months are not accepted
//! because their length is irregular and bucket alignment would drift.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeframeError {
    #[error("empty timeframe")]
    Empty,

    #[error("invalid timeframe '{0}'")]
    Invalid(String),

    #[error("unsupported timeframe unit '{unit}' in '{input}'")]
    UnsupportedUnit { input: String, unit: char },

    #[error("timeframe must be positive: '{0}'")]
    Zero(String),
}

/// Longest period whose length in milliseconds fits an `i64`.
const MAX_SECONDS: i64 = i64::MAX / 1000;

/// A fixed-length bar period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timeframe {
    seconds: i64,
}

impl Timeframe {
    /// Clamped to the longest representable period.
    pub fn from_minutes(minutes: i64) -> Self {
        Self {
            seconds: minutes.saturating_mul(60).min(MAX_SECONDS),
        }
    }

    pub fn millis(&self) -> i64 {
        self.seconds.saturating_mul(1000)
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }

    /// Start of the bucket containing `time`, aligned to the Unix epoch.
    pub fn bucket_start(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let ms = time.timestamp_millis();
        let step = self.millis().max(1);
        ms.div_euclid(step)
            .checked_mul(step)
            .and_then(|aligned| Utc.timestamp_millis_opt(aligned).single())
            .unwrap_or(time)
    }

    /// Whether `other` divides this timeframe into whole bars.
    pub fn is_multiple_of(&self, other: &Timeframe) -> bool {
        other.seconds > 0 && self.seconds % other.seconds == 0
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(TimeframeError::Empty);
        }

        let (digits, unit) = match input.chars().last() {
            Some(c) if c.is_ascii_alphabetic() => (&input[..input.len() - 1], Some(c.to_ascii_uppercase())),
            _ => (input, None),
        };

        let count: i64 = if digits.is_empty() {
            if unit.is_none() {
                return Err(TimeframeError::Invalid(input.to_string()));
            }
            1
        } else {
            digits
                .parse()
                .map_err(|_| TimeframeError::Invalid(input.to_string()))?
        };

        if count <= 0 {
            return Err(TimeframeError::Zero(input.to_string()));
        }

        let unit_seconds = match unit {
            None => 60,
            Some('S') => 1,
            Some('D') => 86_400,
            Some('W') => 7 * 86_400,
            Some(other) => {
                return Err(TimeframeError::UnsupportedUnit {
                    input: input.to_string(),
                    unit: other,
                })
            }
        };

        let seconds = count
            .checked_mul(unit_seconds)
            .filter(|s| *s <= MAX_SECONDS)
            .ok_or_else(|| TimeframeError::Invalid(input.to_string()))?;

        Ok(Self { seconds })
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % (7 * 86_400) == 0 {
            write!(f, "{}W", s / (7 * 86_400))
        } else if s % 86_400 == 0 {
            write!(f, "{}D", s / 86_400)
        } else if s % 60 == 0 {
            write!(f, "{}", s / 60)
        } else {
            write!(f, "{}S", s)
        }
    }
}

impl Serialize for Timeframe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
