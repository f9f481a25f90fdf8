//! Price bars and the per-channel samples derived from them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLC chart bar, keyed by its open time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

impl Bar {
    pub fn new(time: DateTime<Utc>, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
        }
    }

    /// A flat bar where every price equals `price`.
    #[cfg(test)]
    pub fn flat(time: DateTime<Utc>, price: Decimal) -> Self {
        Self::new(time, price, price, price, price)
    }

    /// True range against the previous close (high - low on the first bar).
    pub fn true_range(&self, prev_close: Option<Decimal>) -> Decimal {
        let range = self.high - self.low;
        match prev_close {
            Some(pc) => range
                .max((self.high - pc).abs())
                .max((self.low - pc).abs()),
            None => range,
        }
    }
}

/// What one channel sees for one bar: the source price and its volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSample {
    pub source_price: Decimal,

    /// `None` while the ATR supplier is still warming up
    pub atr: Option<Decimal>,

    /// Strictly increasing per channel (bar open time in ms)
    pub sequence: i64,
}

impl PriceSample {
    pub fn new(source_price: Decimal, atr: Option<Decimal>, sequence: i64) -> Self {
        Self {
            source_price,
            atr,
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_true_range_uses_gaps() {
        let bar = Bar::new(Utc::now(), dec!(10), dec!(12), dec!(9), dec!(11));
        assert_eq!(bar.true_range(None), dec!(3));
        // Gap up from 5: high - prev_close dominates
        assert_eq!(bar.true_range(Some(dec!(5))), dec!(7));
        // Gap down from 15: prev_close - low dominates
        assert_eq!(bar.true_range(Some(dec!(15))), dec!(6));
    }
}
