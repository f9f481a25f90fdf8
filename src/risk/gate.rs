//! Entry gate: caps concurrent positions and blocks new entries for the rest
//! of the day once the day's realized loss reaches the limit.
//!
//! Days are UTC calendar days of the timestamps passed in, so a replay
//! follows bar time rather than the wall clock.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};

const HUNDRED: Decimal = dec!(100);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RiskRejection {
    #[error("max open positions reached ({open}/{max})")]
    MaxOpenPositions { open: usize, max: usize },

    #[error("daily loss {loss_pct}% reached the {limit_pct}% limit")]
    DailyLossLimit { loss_pct: Decimal, limit_pct: Decimal },
}

#[derive(Debug, Clone)]
pub struct RiskGate {
    /// 0 disables
    max_open_positions: usize,
    /// Percent of the day-start balance; 0 disables
    max_daily_loss_pct: Decimal,

    day: Option<NaiveDate>,
    daily_pnl: Decimal,
    /// Set on the first check of the day
    day_start_balance: Option<Decimal>,
}

impl RiskGate {
    pub fn new(max_open_positions: usize, max_daily_loss_pct: Decimal) -> Self {
        Self {
            max_open_positions,
            max_daily_loss_pct,
            day: None,
            daily_pnl: Decimal::ZERO,
            day_start_balance: None,
        }
    }

    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.day == Some(today) {
            return;
        }
        if self.day.is_some() {
            debug!(day = %today, previous_pnl = %self.daily_pnl, "Daily P&L reset");
        }
        self.day = Some(today);
        self.daily_pnl = Decimal::ZERO;
        self.day_start_balance = None;
    }

    /// Add a closed trade's net P&L to the day it closed on.
    pub fn record_close(&mut self, pnl: Decimal, closed_at: DateTime<Utc>) {
        self.roll_day(closed_at);
        self.daily_pnl = self.daily_pnl.saturating_add(pnl);
    }

    /// Whether a new position may open. `balance` is the current balance
    /// including today's realized P&L.
    pub fn check(&mut self, open_positions: usize, balance: Decimal, now: DateTime<Utc>) -> Result<(), RiskRejection> {
        self.roll_day(now);

        if self.max_open_positions > 0 && open_positions >= self.max_open_positions {
            return Err(RiskRejection::MaxOpenPositions {
                open: open_positions,
                max: self.max_open_positions,
            });
        }

        if self.max_daily_loss_pct > Decimal::ZERO {
            let daily_pnl = self.daily_pnl;
            let start = *self
                .day_start_balance
                .get_or_insert_with(|| balance.saturating_sub(daily_pnl));

            if start <= Decimal::ZERO {
                debug!(start = %start, "Day-start balance not positive; daily loss check skipped");
                return Ok(());
            }

            let loss_pct = (-daily_pnl)
                .checked_mul(HUNDRED)
                .and_then(|l| l.checked_div(start))
                .unwrap_or(Decimal::ZERO);
            if loss_pct >= self.max_daily_loss_pct {
                info!(loss_pct = %loss_pct, limit = %self.max_daily_loss_pct, "Daily loss limit reached");
                return Err(RiskRejection::DailyLossLimit {
                    loss_pct: loss_pct.round_dp(2),
                    limit_pct: self.max_daily_loss_pct,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_max_open_positions() {
        let mut gate = RiskGate::new(2, dec!(0));
        assert!(gate.check(1, dec!(1000), morning()).is_ok());
        assert_eq!(
            gate.check(2, dec!(1000), morning()),
            Err(RiskRejection::MaxOpenPositions { open: 2, max: 2 })
        );

        let mut unlimited = RiskGate::new(0, dec!(0));
        assert!(unlimited.check(100, dec!(1000), morning()).is_ok());
    }

    #[test]
    fn test_daily_loss_limit_blocks_until_next_day() {
        let mut gate = RiskGate::new(0, dec!(5));
        let t = morning();

        assert!(gate.check(0, dec!(1000), t).is_ok());
        gate.record_close(dec!(-30), t + Duration::hours(1));
        assert!(gate.check(0, dec!(970), t + Duration::hours(2)).is_ok());

        gate.record_close(dec!(-20), t + Duration::hours(3));
        let err = gate.check(0, dec!(950), t + Duration::hours(4)).unwrap_err();
        assert!(matches!(err, RiskRejection::DailyLossLimit { .. }));
        assert!(err.to_string().contains("5%"));

        assert!(gate.check(0, dec!(950), t + Duration::days(1)).is_ok());
    }

    #[test]
    fn test_day_start_balance_backs_out_earlier_losses() {
        let mut gate = RiskGate::new(0, dec!(10));
        // Loss recorded before the first check: start = 900 + 100
        gate.record_close(dec!(-100), morning());
        assert!(gate.check(0, dec!(900), morning()).is_err());
    }

    #[test]
    fn test_profits_never_trip_the_limit() {
        let mut gate = RiskGate::new(0, dec!(1));
        gate.record_close(dec!(500), morning());
        assert!(gate.check(0, dec!(1500), morning()).is_ok());
    }
}
