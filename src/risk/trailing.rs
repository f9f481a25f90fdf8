//! Percent-based trailing stop attached to an open position.
//!
//! Distinct from the ATR trailing stop that drives signals: this one
//! protects a filled position. It stays dormant until price has moved
//! `activation` percent in favour of the entry, then trails the best price
//! seen by `callback` percent and only ever tightens.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use crate::models::TradeSide;

const HUNDRED: Decimal = dec!(100);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PercentTrailingStop {
    side: TradeSide,
    entry_price: Decimal,
    activation_pct: Decimal,
    callback_pct: Decimal,
    activated: bool,
    /// Highest price for longs, lowest for shorts, since activation
    peak: Option<Decimal>,
    stop_price: Option<Decimal>,
}

impl PercentTrailingStop {
    /// `None` unless entry and both percentages are positive.
    pub fn new(side: TradeSide, entry_price: Decimal, activation_pct: Decimal, callback_pct: Decimal) -> Option<Self> {
        if entry_price <= Decimal::ZERO || activation_pct <= Decimal::ZERO || callback_pct <= Decimal::ZERO {
            return None;
        }

        Some(Self {
            side,
            entry_price,
            activation_pct,
            callback_pct,
            activated: false,
            peak: None,
            stop_price: None,
        })
    }

    /// `None` until activated
    pub fn stop_price(&self) -> Option<Decimal> {
        self.stop_price
    }

    pub fn activation_price(&self) -> Decimal {
        let offset = self.activation_pct / HUNDRED;
        match self.side {
            TradeSide::Buy => self.entry_price * (Decimal::ONE + offset),
            TradeSide::Sell => self.entry_price * (Decimal::ONE - offset),
        }
    }

    fn stop_from(&self, reference: Decimal) -> Decimal {
        let offset = self.callback_pct / HUNDRED;
        match self.side {
            TradeSide::Buy => reference * (Decimal::ONE - offset),
            TradeSide::Sell => reference * (Decimal::ONE + offset),
        }
    }

    fn is_better(&self, candidate: Decimal, current: Decimal) -> bool {
        match self.side {
            TradeSide::Buy => candidate > current,
            TradeSide::Sell => candidate < current,
        }
    }

    /// Feed the latest price. Returns the stop price when it is hit.
    pub fn update(&mut self, price: Decimal) -> Option<Decimal> {
        if price <= Decimal::ZERO {
            return None;
        }

        if !self.activated {
            let activation = self.activation_price();
            let reached = match self.side {
                TradeSide::Buy => price >= activation,
                TradeSide::Sell => price <= activation,
            };
            if !reached {
                return None;
            }

            self.activated = true;
            let initial = self.stop_from(price);
            self.stop_price = (initial > Decimal::ZERO).then_some(initial);
            info!(
                side = %self.side,
                activation = %activation,
                price = %price,
                stop = ?self.stop_price,
                "Trailing stop activated"
            );
        }

        let peak = match self.peak {
            Some(p) if !self.is_better(price, p) => p,
            _ => price,
        };
        self.peak = Some(peak);

        let candidate = self.stop_from(peak);
        if candidate > Decimal::ZERO {
            let tighten = match self.stop_price {
                None => true,
                Some(current) => self.is_better(candidate, current),
            };
            if tighten {
                debug!(side = %self.side, stop = %candidate, peak = %peak, "Trailing stop moved");
                self.stop_price = Some(candidate);
            }
        }

        let stop = self.stop_price?;
        let hit = match self.side {
            TradeSide::Buy => price <= stop,
            TradeSide::Sell => price >= stop,
        };
        hit.then_some(stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_percentages() {
        assert!(PercentTrailingStop::new(TradeSide::Buy, dec!(100), dec!(0), dec!(1)).is_none());
        assert!(PercentTrailingStop::new(TradeSide::Buy, dec!(100), dec!(1), dec!(0)).is_none());
    }

    #[test]
    fn test_long_activates_trails_and_triggers() {
        let mut tsl = PercentTrailingStop::new(TradeSide::Buy, dec!(100), dec!(2), dec!(1)).unwrap();

        // Below activation at 102
        assert_eq!(tsl.update(dec!(101)), None);
        assert_eq!(tsl.stop_price(), None);

        // Activates, stop at 103 * 0.99
        assert_eq!(tsl.update(dec!(103)), None);
        assert_eq!(tsl.stop_price(), Some(dec!(101.97)));

        // New high tightens the stop
        assert_eq!(tsl.update(dec!(110)), None);
        assert_eq!(tsl.stop_price(), Some(dec!(108.90)));

        // Pullback does not loosen it
        assert_eq!(tsl.update(dec!(109)), None);
        assert_eq!(tsl.stop_price(), Some(dec!(108.90)));

        assert_eq!(tsl.update(dec!(108.5)), Some(dec!(108.90)));
    }

    #[test]
    fn test_short_mirrors_long() {
        let mut tsl = PercentTrailingStop::new(TradeSide::Sell, dec!(100), dec!(2), dec!(1)).unwrap();

        assert_eq!(tsl.activation_price(), dec!(98));
        assert_eq!(tsl.update(dec!(97)), None);
        assert_eq!(tsl.stop_price(), Some(dec!(97.97)));

        assert_eq!(tsl.update(dec!(90)), None);
        assert_eq!(tsl.stop_price(), Some(dec!(90.90)));

        assert_eq!(tsl.update(dec!(91)), Some(dec!(90.90)));
    }
}
