//! Heikin-Ashi close used as the smoothed source price.

use rust_decimal::Decimal;

use crate::models::Bar;

/// ha_close = (o + h + l + c) / 4
///
/// The Heikin-Ashi open chains previous candles but never feeds the close,
/// so the source needs no state.
pub fn heikin_ashi_close(bar: &Bar) -> Decimal {
    (bar.open + bar.high + bar.low + bar.close) / Decimal::from(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_close_is_ohlc_mean() {
        let bar = Bar::new(Utc::now(), dec!(10), dec!(14), dec!(8), dec!(12));
        assert_eq!(heikin_ashi_close(&bar), dec!(11));
    }

    #[test]
    fn test_flat_bar_keeps_price() {
        assert_eq!(heikin_ashi_close(&Bar::flat(Utc::now(), dec!(20.5))), dec!(20.5));
    }

    #[test]
    fn test_fractional_mean() {
        let bar = Bar::new(Utc::now(), dec!(12), dec!(16), dec!(12), dec!(15));
        assert_eq!(heikin_ashi_close(&bar), dec!(13.75));
    }
}
