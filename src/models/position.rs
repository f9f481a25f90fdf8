//! Open position with its protective levels.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::risk::{self, PercentTrailingStop};

use super::TradeSide;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    Signal,
    EndOfData,
    None,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "STOP_LOSS"),
            ExitReason::TakeProfit => write!(f, "TAKE_PROFIT"),
            ExitReason::TrailingStop => write!(f, "TRAILING_STOP"),
            ExitReason::Signal => write!(f, "SIGNAL"),
            ExitReason::EndOfData => write!(f, "END_OF_DATA"),
            ExitReason::None => write!(f, "NONE"),
        }
    }
}

/// A filled position tracked against price updates.
#[derive(Debug, Clone)]
pub struct OpenPosition {
    pub side: TradeSide,
    pub entry_price: Decimal,
    pub amount: Decimal,
    pub opened_at: DateTime<Utc>,

    /// `None` when disabled or not computable
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub trailing: Option<PercentTrailingStop>,
}

impl OpenPosition {
    /// Open at `entry_price`, deriving SL/TP from percentages (0 disables).
    pub fn open(
        side: TradeSide,
        entry_price: Decimal,
        amount: Decimal,
        opened_at: DateTime<Utc>,
        stop_loss_pct: Decimal,
        take_profit_pct: Decimal,
    ) -> Self {
        Self {
            side,
            entry_price,
            amount,
            opened_at,
            stop_loss: risk::stop_loss_price(entry_price, stop_loss_pct, side),
            take_profit: risk::take_profit_price(entry_price, take_profit_pct, side),
            trailing: None,
        }
    }

    pub fn with_trailing_stop(mut self, activation_pct: Decimal, callback_pct: Decimal) -> Self {
        self.trailing = PercentTrailingStop::new(self.side, self.entry_price, activation_pct, callback_pct);
        self
    }

    pub fn unrealized_pnl(&self, current_price: Decimal) -> Decimal {
        risk::pnl(self.entry_price, current_price, self.amount, self.side)
    }

    /// Notional value at entry, saturating at `Decimal::MAX`.
    pub fn cost_basis(&self) -> Decimal {
        self.entry_price.saturating_mul(self.amount)
    }

    /// Check protective levels against the latest price: stop-loss first,
    /// then take-profit, then the trailing stop.
    ///
    /// Returns the reason and the price the exit is assumed to fill at.
    pub fn check_exit(&mut self, price: Decimal) -> (ExitReason, Decimal) {
        if price <= Decimal::ZERO {
            return (ExitReason::None, price);
        }

        if let Some(sl) = self.stop_loss.filter(|sl| *sl > Decimal::ZERO) {
            let hit = match self.side {
                TradeSide::Buy => price <= sl,
                TradeSide::Sell => price >= sl,
            };
            if hit {
                return (ExitReason::StopLoss, price);
            }
        }

        if let Some(tp) = self.take_profit.filter(|tp| *tp > Decimal::ZERO) {
            let hit = match self.side {
                TradeSide::Buy => price >= tp,
                TradeSide::Sell => price <= tp,
            };
            if hit {
                return (ExitReason::TakeProfit, price);
            }
        }

        if let Some(trailing) = self.trailing.as_mut() {
            if trailing.update(price).is_some() {
                return (ExitReason::TrailingStop, price);
            }
        }

        (ExitReason::None, price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn long_position() -> OpenPosition {
        OpenPosition::open(TradeSide::Buy, dec!(100), dec!(2), Utc::now(), dec!(2), dec!(4))
    }

    #[test]
    fn test_levels_derived_on_open() {
        let pos = long_position();
        assert_eq!(pos.stop_loss, Some(dec!(98)));
        assert_eq!(pos.take_profit, Some(dec!(104)));
        assert_eq!(pos.cost_basis(), dec!(200));
        assert_eq!(pos.unrealized_pnl(dec!(110)), dec!(20));
    }

    #[test]
    fn test_disabled_levels_never_trigger() {
        let mut pos = OpenPosition::open(TradeSide::Sell, dec!(100), dec!(1), Utc::now(), dec!(0), dec!(0));
        assert_eq!(pos.stop_loss, None);
        assert_eq!(pos.take_profit, None);
        assert_eq!(pos.check_exit(dec!(1000)).0, ExitReason::None);
    }

    #[test]
    fn test_stop_loss_before_take_profit() {
        let mut pos = long_position();
        assert_eq!(pos.check_exit(dec!(99)).0, ExitReason::None);
        assert_eq!(pos.check_exit(dec!(97.5)).0, ExitReason::StopLoss);
        assert_eq!(pos.check_exit(dec!(104)).0, ExitReason::TakeProfit);
    }

    #[test]
    fn test_trailing_stop_exit() {
        let mut pos = OpenPosition::open(TradeSide::Buy, dec!(100), dec!(1), Utc::now(), dec!(0), dec!(0))
            .with_trailing_stop(dec!(1), dec!(1));
        assert_eq!(pos.check_exit(dec!(105)).0, ExitReason::None);
        let (reason, fill) = pos.check_exit(dec!(103));
        assert_eq!(reason, ExitReason::TrailingStop);
        assert_eq!(fill, dec!(103));
    }
}
