//! Performance statistics over closed trades: win rate, drawdown, Sharpe, etc.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use statrs::statistics::Statistics;

use crate::models::ClosedTrade;

/// Summary statistics for a sequence of closed trades.
#[derive(Debug, Clone, Default)]
pub struct PerformanceReport {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,

    /// Fraction of trades with positive net P&L (0.0 to 1.0)
    pub win_rate: f64,

    pub total_pnl: Decimal,
    pub total_fees: Decimal,
    pub avg_win: Decimal,

    /// Reported as a positive amount
    pub avg_loss: Decimal,

    /// Gross profit / gross loss; 0 when there are no losses
    pub profit_factor: f64,

    /// Mean net P&L per trade
    pub expectancy: Decimal,

    /// Largest peak-to-trough drop of cumulative P&L
    pub max_drawdown: Decimal,

    /// `max_drawdown` relative to the peak it fell from (0.0 to 1.0)
    pub max_drawdown_pct: f64,

    /// Mean / standard deviation of per-trade returns (not annualized)
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,

    pub avg_holding_hours: f64,
}

pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn calculate(trades: &[ClosedTrade]) -> PerformanceReport {
        let mut report = PerformanceReport::default();

        if trades.is_empty() {
            return report;
        }

        report.total_trades = trades.len();
        report.total_fees = trades.iter().map(|t| t.fees).sum();
        report.avg_holding_hours =
            trades.iter().map(|t| t.holding_hours()).sum::<f64>() / trades.len() as f64;

        Self::calculate_pnl_metrics(&mut report, trades);

        let pnls: Vec<Decimal> = trades.iter().map(|t| t.pnl).collect();
        Self::calculate_drawdown(&mut report, &pnls);

        let returns: Vec<f64> = trades.iter().filter_map(|t| t.return_pct.to_f64()).collect();
        Self::calculate_sharpe_sortino(&mut report, &returns);

        report
    }

    fn calculate_pnl_metrics(report: &mut PerformanceReport, trades: &[ClosedTrade]) {
        let (wins, rest): (Vec<&ClosedTrade>, Vec<&ClosedTrade>) = trades.iter().partition(|t| t.is_win());
        let wins: Vec<Decimal> = wins.iter().map(|t| t.pnl).collect();
        // Break-even trades count as neither
        let losses: Vec<Decimal> = rest.iter().map(|t| t.pnl).filter(|p| *p < Decimal::ZERO).collect();

        report.winning_trades = wins.len();
        report.losing_trades = losses.len();
        report.total_pnl = trades.iter().map(|t| t.pnl).sum();
        report.win_rate = wins.len() as f64 / trades.len() as f64;

        let gross_profit: Decimal = wins.iter().copied().sum();
        let gross_loss: Decimal = losses.iter().map(|l| l.abs()).sum();

        if !wins.is_empty() {
            report.avg_win = gross_profit / Decimal::from(wins.len() as u64);
        }
        if !losses.is_empty() {
            report.avg_loss = gross_loss / Decimal::from(losses.len() as u64);
        }
        if gross_loss > Decimal::ZERO {
            report.profit_factor =
                gross_profit.to_f64().unwrap_or(0.0) / gross_loss.to_f64().unwrap_or(1.0);
        }

        report.expectancy = report.total_pnl / Decimal::from(trades.len() as u64);
    }

    fn calculate_drawdown(report: &mut PerformanceReport, pnls: &[Decimal]) {
        let mut equity = Decimal::ZERO;
        let mut peak = Decimal::ZERO;
        let mut max_dd = Decimal::ZERO;
        let mut max_dd_pct = 0.0f64;

        for pnl in pnls {
            equity += pnl;
            peak = peak.max(equity);

            let dd = peak - equity;
            max_dd = max_dd.max(dd);

            if peak > Decimal::ZERO {
                let dd_pct = dd.to_f64().unwrap_or(0.0) / peak.to_f64().unwrap_or(1.0);
                max_dd_pct = max_dd_pct.max(dd_pct);
            }
        }

        report.max_drawdown = max_dd;
        report.max_drawdown_pct = max_dd_pct;
    }

    fn calculate_sharpe_sortino(report: &mut PerformanceReport, returns: &[f64]) {
        if returns.len() < 2 {
            return;
        }

        let mean = returns.mean();
        let std_dev = returns.std_dev();

        if std_dev > 0.0 {
            report.sharpe_ratio = mean / std_dev;
        }

        let negative: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        if negative.len() >= 2 {
            let downside = negative.std_dev();
            if downside > 0.0 {
                report.sortino_ratio = mean / downside;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use crate::models::TradeSide;

    fn trade(pnl: Decimal, return_pct: Decimal, hours: i64) -> ClosedTrade {
        let entry_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        ClosedTrade {
            ticker: "BTCUSDT".to_string(),
            side: TradeSide::Buy,
            amount: dec!(1),
            entry_price: dec!(100),
            exit_price: dec!(100) + pnl,
            entry_time,
            exit_time: entry_time + Duration::hours(hours),
            pnl,
            return_pct,
            fees: dec!(0.1),
            exit_reason: "SIGNAL".to_string(),
        }
    }

    #[test]
    fn test_empty() {
        let report = MetricsCalculator::calculate(&[]);
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.win_rate, 0.0);
    }

    #[test]
    fn test_pnl_metrics() {
        let trades = vec![
            trade(dec!(10), dec!(0.10), 2),
            trade(dec!(-5), dec!(-0.05), 4),
            trade(dec!(20), dec!(0.20), 6),
            trade(dec!(-15), dec!(-0.15), 8),
        ];
        let report = MetricsCalculator::calculate(&trades);

        assert_eq!(report.total_trades, 4);
        assert_eq!(report.winning_trades, 2);
        assert_eq!(report.losing_trades, 2);
        assert!((report.win_rate - 0.5).abs() < 1e-9);
        assert_eq!(report.total_pnl, dec!(10));
        assert_eq!(report.avg_win, dec!(15));
        assert_eq!(report.avg_loss, dec!(10));
        assert!((report.profit_factor - 1.5).abs() < 1e-9);
        assert_eq!(report.expectancy, dec!(2.5));
        assert_eq!(report.total_fees, dec!(0.4));
        assert!((report.avg_holding_hours - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_drawdown_from_cumulative_pnl() {
        // Equity: 10, 5, 25, 10
        let trades = vec![
            trade(dec!(10), dec!(0.1), 1),
            trade(dec!(-5), dec!(-0.05), 1),
            trade(dec!(20), dec!(0.2), 1),
            trade(dec!(-15), dec!(-0.15), 1),
        ];
        let report = MetricsCalculator::calculate(&trades);
        assert_eq!(report.max_drawdown, dec!(15));
        assert!((report.max_drawdown_pct - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_sharpe_sign() {
        let winners = vec![
            trade(dec!(1), dec!(0.01), 1),
            trade(dec!(3), dec!(0.03), 1),
            trade(dec!(2), dec!(0.02), 1),
        ];
        assert!(MetricsCalculator::calculate(&winners).sharpe_ratio > 0.0);

        let losers = vec![
            trade(dec!(-1), dec!(-0.01), 1),
            trade(dec!(-3), dec!(-0.03), 1),
        ];
        let report = MetricsCalculator::calculate(&losers);
        assert!(report.sharpe_ratio < 0.0);
        assert!(report.sortino_ratio < 0.0);
    }

    #[test]
    fn test_break_even_is_neither_win_nor_loss() {
        let trades = vec![
            trade(dec!(0), dec!(0), 1),
            trade(dec!(4), dec!(0.04), 1),
            trade(dec!(-2), dec!(-0.02), 1),
        ];
        let report = MetricsCalculator::calculate(&trades);
        assert_eq!(report.winning_trades, 1);
        assert_eq!(report.losing_trades, 1);
        assert!((report.win_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((report.profit_factor - 2.0).abs() < 1e-9);
    }
}
