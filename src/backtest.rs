//! Historical replay of the signal engine with simulated positions.
//!
//! Per bar, protective exits (stop-loss, take-profit, trailing stop) are
//! checked against the close before the bar's signal is applied. Entries are
//! sized from the running balance and pass the risk gate first. Events:
//! - Open with no position: open
//! - Open against an existing position: close it, then open the new side
//! - Open on the side already held: ignored
//! - Close matching the held side: close
//!
//! Anything still open after the last bar is closed at its close.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::SignalPipeline;
use crate::metrics::{MetricsCalculator, PerformanceReport};
use crate::models::{Bar, ClosedTrade, Direction, ExitReason, OpenPosition, SignalEvent, TradeSide};
use crate::risk::{self, RiskGate};

/// An event as it fired during the replay.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub time: DateTime<Utc>,
    pub event: SignalEvent,
    pub price: Decimal,
    pub direction: Direction,
}

/// Backtest results summary.
#[derive(Debug, Clone)]
pub struct BacktestResults {
    pub ticker: String,
    pub bars: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    pub events: Vec<EventRecord>,
    pub trades: Vec<ClosedTrade>,

    /// Open events that did not become positions (gate or zero size)
    pub rejected_entries: usize,

    pub initial_balance: Decimal,
    pub final_balance: Decimal,

    /// Cumulative realized P&L after each closed trade
    pub equity_curve: Vec<(DateTime<Utc>, Decimal)>,

    pub report: PerformanceReport,
}

impl BacktestResults {
    /// Number of events of each kind, keyed by event code.
    pub fn event_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.events {
            *counts.entry(record.event.code()).or_insert(0) += 1;
        }
        counts
    }

    /// Closed trades per exit reason.
    pub fn exit_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for trade in &self.trades {
            *counts.entry(trade.exit_reason.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl fmt::Display for BacktestResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.report;

        writeln!(f, "\n{:=^60}", " BACKTEST RESULTS ")?;
        writeln!(f)?;
        writeln!(f, "Ticker: {}", self.ticker)?;
        writeln!(
            f,
            "Period: {} to {} ({} bars)",
            self.start_time.format("%Y-%m-%d %H:%M"),
            self.end_time.format("%Y-%m-%d %H:%M"),
            self.bars
        )?;
        writeln!(f)?;
        writeln!(f, "--- Signals ---")?;
        for (code, count) in self.event_counts() {
            writeln!(f, "{:<13} {}", code, count)?;
        }
        writeln!(f)?;
        writeln!(f, "--- Trades ---")?;
        writeln!(f, "Total:       {}", r.total_trades)?;
        writeln!(f, "Rejected:    {}", self.rejected_entries)?;
        writeln!(f, "Winners:     {} ({:.1}%)", r.winning_trades, r.win_rate * 100.0)?;
        writeln!(f, "Losers:      {}", r.losing_trades)?;
        writeln!(f, "Avg Win:     {:.2}", r.avg_win)?;
        writeln!(f, "Avg Loss:    {:.2}", r.avg_loss)?;
        writeln!(f, "Profit Factor: {:.2}", r.profit_factor)?;
        for (reason, count) in self.exit_counts() {
            writeln!(f, "  {:<13} {}", reason, count)?;
        }
        writeln!(f)?;
        writeln!(f, "--- P&L ---")?;
        writeln!(f, "Balance:     {:.2} -> {:.2}", self.initial_balance, self.final_balance)?;
        writeln!(f, "Net P&L:     {:.2}", r.total_pnl)?;
        writeln!(f, "Fees Paid:   {:.2}", r.total_fees)?;
        writeln!(f, "Expectancy:  {:.2}", r.expectancy)?;
        writeln!(f)?;
        writeln!(f, "--- Risk Metrics ---")?;
        writeln!(f, "Max Drawdown: {:.2} ({:.2}%)", r.max_drawdown, r.max_drawdown_pct * 100.0)?;
        writeln!(f, "Sharpe Ratio: {:.2}", r.sharpe_ratio)?;
        writeln!(f, "Sortino Ratio: {:.2}", r.sortino_ratio)?;
        writeln!(f)?;
        writeln!(f, "--- Timing ---")?;
        writeln!(f, "Avg Hold:    {:.1} hours", r.avg_holding_hours)?;
        writeln!(f, "{:=^60}", "")?;
        Ok(())
    }
}

/// Closed trades and the running balance they produce.
struct Ledger {
    initial_balance: Decimal,
    realized: Decimal,
    trades: Vec<ClosedTrade>,
    equity_curve: Vec<(DateTime<Utc>, Decimal)>,
    gate: RiskGate,
}

impl Ledger {
    fn balance(&self) -> Decimal {
        self.initial_balance.saturating_add(self.realized)
    }

    fn record(&mut self, trade: ClosedTrade) {
        self.realized = self.realized.saturating_add(trade.pnl);
        self.gate.record_close(trade.pnl, trade.exit_time);
        self.equity_curve.push((trade.exit_time, self.realized));
        self.trades.push(trade);
    }
}

/// Backtesting engine.
pub struct Backtester {
    config: EngineConfig,
}

impl Backtester {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Replay `bars` (oldest first) through a fresh pipeline.
    pub fn run(&self, bars: &[Bar]) -> Result<BacktestResults> {
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            bail!("No bars to replay");
        };

        info!(
            bars = bars.len(),
            config = %self.config.digest(),
            "Starting replay"
        );

        let mut pipeline = SignalPipeline::new(&self.config);
        let mut position: Option<OpenPosition> = None;
        let mut events = Vec::new();
        let mut rejected_entries = 0usize;
        let mut ledger = Ledger {
            initial_balance: self.config.initial_balance,
            realized: Decimal::ZERO,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            gate: RiskGate::new(
                self.config.max_open_positions,
                self.config.max_daily_loss_percentage,
            ),
        };

        for bar in bars {
            let price = bar.close;

            if let Some(pos) = position.as_mut() {
                let (reason, fill) = pos.check_exit(price);
                if reason != ExitReason::None {
                    if let Some(pos) = position.take() {
                        ledger.record(self.close(pos, fill, bar.time, reason));
                    }
                }
            }

            let event = pipeline.on_bar(bar);
            if event.is_none() {
                continue;
            }

            events.push(EventRecord {
                time: bar.time,
                event,
                price,
                direction: pipeline.direction(),
            });

            let open_side = match event {
                SignalEvent::OpenLong => Some(TradeSide::Buy),
                SignalEvent::OpenShort => Some(TradeSide::Sell),
                _ => None,
            };
            let close_side = match event {
                SignalEvent::CloseLong => Some(TradeSide::Buy),
                SignalEvent::CloseShort => Some(TradeSide::Sell),
                _ => open_side.map(|side| side.opposite()),
            };

            if let Some(side) = close_side {
                if position.as_ref().map(|p| p.side) == Some(side) {
                    if let Some(pos) = position.take() {
                        ledger.record(self.close(pos, price, bar.time, ExitReason::Signal));
                    }
                }
            }

            if let Some(side) = open_side {
                if position.is_none() {
                    position = self.open(side, price, bar.time, &mut ledger);
                    if position.is_none() {
                        rejected_entries += 1;
                    }
                }
            }
        }

        if let Some(pos) = position.take() {
            ledger.record(self.close(pos, last.close, last.time, ExitReason::EndOfData));
        }

        let report = MetricsCalculator::calculate(&ledger.trades);
        let final_balance = ledger.balance();

        info!(
            events = events.len(),
            trades = ledger.trades.len(),
            rejected = rejected_entries,
            pnl = %report.total_pnl,
            "Replay finished"
        );

        Ok(BacktestResults {
            ticker: self.config.ticker.clone(),
            bars: bars.len(),
            start_time: first.time,
            end_time: last.time,
            events,
            trades: ledger.trades,
            rejected_entries,
            initial_balance: self.config.initial_balance,
            final_balance,
            equity_curve: ledger.equity_curve,
            report,
        })
    }

    /// Open a position when the gate allows it and sizing yields a positive
    /// amount. Only called while flat.
    fn open(&self, side: TradeSide, price: Decimal, time: DateTime<Utc>, ledger: &mut Ledger) -> Option<OpenPosition> {
        let balance = ledger.balance();
        if let Err(reason) = ledger.gate.check(0, balance, time) {
            info!(side = %side, price = %price, %reason, "Entry rejected");
            return None;
        }

        let stop_loss = risk::stop_loss_price(price, self.config.stop_loss_percentage, side);
        let amount = risk::position_size(
            balance,
            self.config.risk_per_trade_percentage,
            price,
            stop_loss,
            self.config.amount_limit(),
        )
        .filter(|amount| *amount > Decimal::ZERO);
        let Some(amount) = amount else {
            info!(side = %side, price = %price, balance = %balance, "Entry skipped: no position size");
            return None;
        };

        let mut pos = OpenPosition::open(
            side,
            price,
            amount,
            time,
            self.config.stop_loss_percentage,
            self.config.take_profit_percentage,
        );
        if self.config.trailing_stop_enabled() {
            pos = pos.with_trailing_stop(
                self.config.tsl_activation_percentage,
                self.config.tsl_callback_percentage,
            );
        }

        debug!(
            side = %side,
            price = %price,
            amount = %amount,
            stop_loss = ?pos.stop_loss,
            take_profit = ?pos.take_profit,
            "Opened position"
        );
        Some(pos)
    }

    fn close(&self, pos: OpenPosition, price: Decimal, time: DateTime<Utc>, reason: ExitReason) -> ClosedTrade {
        let gross = pos.unrealized_pnl(price);
        let notional = pos.cost_basis().saturating_add(price.saturating_mul(pos.amount));
        let fees = notional.saturating_mul(self.config.fee_rate);
        let pnl = gross.saturating_sub(fees);

        debug!(
            side = %pos.side,
            entry = %pos.entry_price,
            exit = %price,
            pnl = %pnl,
            reason = %reason,
            trailing_stop = ?pos.trailing.as_ref().and_then(|t| t.stop_price()),
            "Closed position"
        );

        ClosedTrade {
            ticker: self.config.ticker.clone(),
            side: pos.side,
            amount: pos.amount,
            entry_price: pos.entry_price,
            exit_price: price,
            entry_time: pos.opened_at,
            exit_time: time,
            pnl,
            return_pct: risk::return_pct(pos.entry_price, price, pos.side),
            fees,
            exit_reason: reason.to_string(),
        }
    }
}
