//! Streaming Average True Range with Wilder smoothing.
//!
//! - First value: simple mean of the first `period` true ranges
//! - Subsequent: atr = (prev_atr * (period - 1) + tr) / period
//!
//! The first bar's true range is its high - low. No value is produced until
//! `period` bars have been seen.

use rust_decimal::Decimal;

use crate::models::Bar;

#[derive(Debug, Clone)]
pub struct AtrSupplier {
    period: usize,
    prev_close: Option<Decimal>,
    /// True ranges collected while warming up
    seed: Vec<Decimal>,
    value: Option<Decimal>,
}

impl AtrSupplier {
    /// A zero period is treated as 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            prev_close: None,
            seed: Vec::with_capacity(period),
            value: None,
        }
    }

    /// Fold in a closed bar and return the updated ATR, `None` during warm-up.
    pub fn update(&mut self, bar: &Bar) -> Option<Decimal> {
        let tr = bar.true_range(self.prev_close);
        self.prev_close = Some(bar.close);
        let n = Decimal::from(self.period as u64);

        self.value = match self.value {
            Some(prev) => Some((prev * (n - Decimal::ONE) + tr) / n),
            None => {
                self.seed.push(tr);
                if self.seed.len() == self.period {
                    let sum: Decimal = self.seed.drain(..).sum();
                    Some(sum / n)
                } else {
                    None
                }
            }
        };

        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bars(ranges: &[(Decimal, Decimal, Decimal)]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ranges
            .iter()
            .enumerate()
            .map(|(i, (h, l, c))| Bar::new(start + Duration::hours(i as i64), *c, *h, *l, *c))
            .collect()
    }

    #[test]
    fn test_warmup_then_seeded_mean() {
        let mut atr = AtrSupplier::new(3);
        let series = bars(&[
            (dec!(11), dec!(9), dec!(10)),  // tr 2
            (dec!(12), dec!(10), dec!(11)), // tr 2
            (dec!(15), dec!(11), dec!(14)), // tr 4
        ]);

        assert_eq!(atr.update(&series[0]), None);
        assert_eq!(atr.update(&series[1]), None);
        assert_eq!(atr.update(&series[2]), Some(dec!(8) / dec!(3)));
    }

    #[test]
    fn test_wilder_smoothing_after_seed() {
        let mut atr = AtrSupplier::new(2);
        let series = bars(&[
            (dec!(11), dec!(9), dec!(10)),  // tr 2
            (dec!(12), dec!(10), dec!(11)), // tr 2 -> atr 2
            (dec!(16), dec!(12), dec!(15)), // tr max(4, 5, 1) = 5 -> (2 + 5) / 2
        ]);

        atr.update(&series[0]);
        assert_eq!(atr.update(&series[1]), Some(dec!(2)));
        assert_eq!(atr.update(&series[2]), Some(dec!(3.5)));
    }

    #[test]
    fn test_zero_period_acts_as_one() {
        let mut atr = AtrSupplier::new(0);
        let series = bars(&[(dec!(11), dec!(9), dec!(10)), (dec!(14), dec!(10), dec!(13))]);
        assert_eq!(atr.update(&series[0]), Some(dec!(2)));
        // Period 1: the ATR is the latest true range
        assert_eq!(atr.update(&series[1]), Some(dec!(4)));
    }
}
