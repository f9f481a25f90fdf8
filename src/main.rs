//! UT Bot signal engine
//!
//! Dual-timeframe ATR trailing-stop signals with decimal-safe risk
//! arithmetic. Replays bar files, streams bars from stdin, and evaluates
//! stop-loss / take-profit / P&L from the command line.

mod alert;
mod backtest;
mod config;
mod data;
mod engine;
mod indicators;
mod metrics;
mod models;
mod risk;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tokio::io::BufReader;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::alert::AlertMessage;
use crate::backtest::Backtester;
use crate::config::{EngineConfig, OrderType};
use crate::data::{load_bars, BarStream};
use crate::engine::SignalPipeline;
use crate::models::{Timeframe, TradeSide};
use crate::risk::{
    pnl_from_str, position_size, quantize_opt, quantize_str, to_decimal, AmountType, RiskRequest, RoundingMode,
    NOT_AVAILABLE,
};

/// UT Bot signal engine CLI.
#[derive(Parser)]
#[command(name = "utbot")]
#[command(about = "Dual-timeframe ATR trailing-stop signals and risk arithmetic", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "UTBOT_LOG_LEVEL")]
    log_level: String,

    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Commands,
}

/// Command-line overrides, applied on top of defaults and `UTBOT_*` variables.
#[derive(Args, Default)]
struct ConfigOverrides {
    /// ATR multiplier (key value)
    #[arg(long)]
    sensitivity: Option<Decimal>,

    #[arg(long)]
    atr_period: Option<usize>,

    /// Use the Heikin-Ashi close as source
    #[arg(long)]
    heikin_ashi: bool,

    /// Higher timeframe, e.g. 240, 1D, 1W
    #[arg(long)]
    htf: Option<Timeframe>,

    /// Timeframe of the input bars
    #[arg(long)]
    chart_tf: Option<Timeframe>,

    /// Stop-loss percent from entry (0 disables)
    #[arg(long)]
    sl_pct: Option<Decimal>,

    /// Take-profit percent from entry (0 disables)
    #[arg(long)]
    tp_pct: Option<Decimal>,

    /// Position trailing-stop activation percent
    #[arg(long)]
    tsl_activation: Option<Decimal>,

    /// Position trailing-stop callback percent
    #[arg(long)]
    tsl_callback: Option<Decimal>,

    #[arg(long)]
    ticker: Option<String>,

    #[arg(long)]
    order_type: Option<OrderType>,

    /// Percent of balance risked per trade (0 disables)
    #[arg(long)]
    risk_pct: Option<Decimal>,

    /// How --amount-value is read (fixed, percentage, quote_fixed)
    #[arg(long)]
    amount_type: Option<AmountType>,

    /// Trade amount; fixed replaces the risk size, the others cap it
    #[arg(long)]
    amount_value: Option<Decimal>,

    /// Starting balance for replays
    #[arg(long)]
    balance: Option<Decimal>,

    /// Maximum concurrent positions (0 disables)
    #[arg(long)]
    max_open_positions: Option<usize>,

    /// Daily loss limit in percent of the day-start balance (0 disables)
    #[arg(long)]
    max_daily_loss: Option<Decimal>,

    /// Fee per side as a fraction of notional
    #[arg(long)]
    fee_rate: Option<Decimal>,
}

impl ConfigOverrides {
    fn apply(self, config: &mut EngineConfig) {
        if let Some(v) = self.sensitivity {
            config.sensitivity = v;
        }
        if let Some(v) = self.atr_period {
            config.atr_period = v;
        }
        if self.heikin_ashi {
            config.use_smoothed_source = true;
        }
        if let Some(v) = self.htf {
            config.higher_timeframe = v;
        }
        if let Some(v) = self.chart_tf {
            config.chart_timeframe = v;
        }
        if let Some(v) = self.sl_pct {
            config.stop_loss_percentage = v;
        }
        if let Some(v) = self.tp_pct {
            config.take_profit_percentage = v;
        }
        if let Some(v) = self.tsl_activation {
            config.tsl_activation_percentage = v;
        }
        if let Some(v) = self.tsl_callback {
            config.tsl_callback_percentage = v;
        }
        if let Some(v) = self.ticker {
            config.ticker = v;
        }
        if let Some(v) = self.order_type {
            config.order_type = v;
        }
        if let Some(v) = self.risk_pct {
            config.risk_per_trade_percentage = v;
        }
        if let Some(v) = self.amount_type {
            config.amount_type = v;
        }
        if let Some(v) = self.amount_value {
            config.amount_value = v;
        }
        if let Some(v) = self.balance {
            config.initial_balance = v;
        }
        if let Some(v) = self.max_open_positions {
            config.max_open_positions = v;
        }
        if let Some(v) = self.max_daily_loss {
            config.max_daily_loss_percentage = v;
        }
        if let Some(v) = self.fee_rate {
            config.fee_rate = v;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a CSV bar file and report signals and performance
    Replay {
        /// CSV file with time,open,high,low,close rows
        #[arg(short, long)]
        bars: PathBuf,

        /// Print events as JSON alert messages
        #[arg(long)]
        alerts: bool,
    },

    /// Read CSV bar rows from stdin and print one JSON alert per event
    Stream,

    /// Evaluate stop-loss, take-profit and P&L from raw values
    Risk {
        /// Entry price
        #[arg(long)]
        entry: String,

        /// Position side (buy/sell, long/short)
        #[arg(long)]
        side: String,

        /// Stop-loss percent
        #[arg(long)]
        stop_loss: Option<String>,

        /// Take-profit percent
        #[arg(long)]
        take_profit: Option<String>,

        /// Current price, for P&L
        #[arg(long)]
        current: Option<String>,

        /// Filled amount, for P&L
        #[arg(long)]
        amount: Option<String>,

        /// Quote balance, for position sizing (uses --stop-loss and the
        /// configured risk and amount settings)
        #[arg(long)]
        size_from_balance: Option<String>,

        /// Fractional digits to display
        #[arg(long, default_value = "2")]
        decimals: i32,

        /// Rounding mode (half_up, half_even, half_down, down, up, floor, ceiling)
        #[arg(long, default_value = "half_up")]
        rounding: RoundingMode,

        /// Prefix non-negative P&L with '+'
        #[arg(long)]
        sign: bool,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("Failed to load {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let mut config = EngineConfig::from_env()?;
    cli.overrides.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Replay { bars, alerts } => {
            let bars = load_bars(&bars)?;
            info!(count = bars.len(), "Loaded bars");

            let backtester = Backtester::new(config.clone())?;
            let results = backtester.run(&bars)?;

            for record in &results.events {
                if alerts {
                    if let Some(msg) = AlertMessage::from_event(record.event, &config, record.price) {
                        println!("{}", msg.to_json()?);
                    }
                } else {
                    println!(
                        "{}  {:<12} {:>14}  HTF {}",
                        record.time.format("%Y-%m-%d %H:%M"),
                        record.event,
                        record.price,
                        record.direction
                    );
                }
            }

            println!("{}", results);
        }

        Commands::Stream => {
            info!(config = %config.digest(), "Streaming bars from stdin");

            let mut stream = BarStream::new(BufReader::new(tokio::io::stdin()));
            let mut pipeline = SignalPipeline::new(&config);
            let mut bars = 0usize;

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Interrupted");
                        break;
                    }
                    next = stream.next_bar() => {
                        let Some(bar) = next? else {
                            break;
                        };
                        bars += 1;

                        let event = pipeline.on_bar(&bar);
                        if let Some(msg) = AlertMessage::from_event(event, &config, bar.close) {
                            println!("{}", msg.to_json()?);
                        }
                    }
                }
            }

            info!(
                bars,
                direction = %pipeline.direction(),
                ltf_stop = ?pipeline.ltf_stop(),
                htf_stop = ?pipeline.htf_stop(),
                "Stream ended"
            );
        }

        Commands::Risk {
            entry,
            side,
            stop_loss,
            take_profit,
            current,
            amount,
            size_from_balance,
            decimals,
            rounding,
            sign,
        } => {
            let fmt_price = |v: Option<Decimal>| quantize_opt(v, decimals, rounding, false, NOT_AVAILABLE);

            println!("\n=== Risk ===\n");
            println!("Entry:        {}", quantize_str(&entry, decimals, rounding, false, NOT_AVAILABLE));
            println!("Side:         {}", side.parse::<TradeSide>().map(|s| s.to_string()).unwrap_or_else(|_| NOT_AVAILABLE.to_string()));

            let mut stop_price = None;
            if let Some(pct) = &stop_loss {
                stop_price = RiskRequest::parse(&entry, pct, &side).and_then(|r| r.stop_loss_price());
                println!("Stop Loss:    {}", fmt_price(stop_price));
            }

            if let Some(pct) = take_profit {
                let price = RiskRequest::parse(&entry, &pct, &side).and_then(|r| r.take_profit_price());
                println!("Take Profit:  {}", fmt_price(price));
            }

            if let Some(current) = current {
                let amount = amount.unwrap_or_else(|| "1".to_string());
                let pnl = match side.parse::<TradeSide>() {
                    Ok(side) => pnl_from_str(&entry, &current, &amount, side),
                    Err(e) => {
                        warn!(error = %e, "Cannot compute P&L");
                        None
                    }
                };
                println!("P&L:          {}", quantize_opt(pnl, decimals, rounding, sign, NOT_AVAILABLE));
            }

            if let Some(balance) = size_from_balance {
                let size = match (to_decimal(&balance), to_decimal(&entry)) {
                    (Some(balance), Some(entry)) => position_size(
                        balance,
                        config.risk_per_trade_percentage,
                        entry,
                        stop_price,
                        config.amount_limit(),
                    ),
                    _ => None,
                };
                println!("Size:         {}", quantize_opt(size, 8, RoundingMode::Down, false, NOT_AVAILABLE));
            }
        }

        Commands::Config => {
            println!("\n=== Engine Configuration ===\n");
            println!("Signals:");
            println!("  Sensitivity:          {}", config.sensitivity);
            println!("  ATR Period:           {}", config.atr_period);
            println!("  Heikin-Ashi Source:   {}", config.use_smoothed_source);
            println!("  Chart Timeframe:      {}", config.chart_timeframe);
            println!("  Higher Timeframe:     {}", config.higher_timeframe);

            println!("\nRisk Management:");
            println!("  Stop Loss:            {}%", config.stop_loss_percentage);
            println!("  Take Profit:          {}%", config.take_profit_percentage);
            println!("  TSL Activation:       {}%", config.tsl_activation_percentage);
            println!("  TSL Callback:         {}%", config.tsl_callback_percentage);

            println!("\nAlerts:");
            println!("  Ticker:               {}", config.ticker);
            println!("  Order Type:           {}", config.order_type);
            println!("  Quantity:             {}", config.quantity);
            println!("  Signal Prefix:        {}", config.signal_prefix);

            println!("\nSizing:");
            println!("  Risk Per Trade:       {}%", config.risk_per_trade_percentage);
            println!("  Amount:               {} ({})", config.amount_value, config.amount_type);
            println!("  Max Open Positions:   {}", config.max_open_positions);
            println!("  Max Daily Loss:       {}%", config.max_daily_loss_percentage);

            println!("\nReplay:");
            println!("  Initial Balance:      {}", config.initial_balance);
            println!("  Fee Rate:             {}", config.fee_rate);
        }
    }

    Ok(())
}
