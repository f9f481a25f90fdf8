//! Engine, risk and alert configuration.
//!
//! Layering: built-in defaults, then `UTBOT_*` environment variables (a `.env`
//! file is loaded into the environment first), then CLI flags applied by the
//! caller.

use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::Timeframe;
use crate::risk::{AmountLimit, AmountType};

/// Order type forwarded in alert messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "market" => Ok(OrderType::Market),
            "limit" => Ok(OrderType::Limit),
            other => bail!("Unknown order type: {}", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// ATR multiplier for the trailing stop (key value)
    pub sensitivity: Decimal,

    pub atr_period: usize,

    /// Use the Heikin-Ashi close as source instead of the chart close
    pub use_smoothed_source: bool,

    pub higher_timeframe: Timeframe,

    /// Timeframe of the incoming bars
    pub chart_timeframe: Timeframe,

    /// Percent from entry; 0 disables
    pub stop_loss_percentage: Decimal,
    pub take_profit_percentage: Decimal,

    /// Position trailing stop; both must be > 0 to enable
    pub tsl_activation_percentage: Decimal,
    pub tsl_callback_percentage: Decimal,

    pub ticker: String,
    pub order_type: OrderType,

    /// Passed through to alerts as-is; the executor sizes orders
    pub quantity: String,

    /// Alert ids are `<prefix>_OPEN_LONG` etc.
    pub signal_prefix: String,

    /// Percent of balance risked between entry and stop-loss; 0 disables
    pub risk_per_trade_percentage: Decimal,

    /// Trade amount, replacing (`fixed`) or capping the risk size; 0 disables
    pub amount_type: AmountType,
    pub amount_value: Decimal,

    /// Starting quote balance for replays
    pub initial_balance: Decimal,

    /// 0 disables
    pub max_open_positions: usize,

    /// Percent of the day-start balance; 0 disables
    pub max_daily_loss_percentage: Decimal,

    /// Fee per side as a fraction of notional (0.001 = 0.1%)
    pub fee_rate: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sensitivity: dec!(1.0),
            atr_period: 10,
            use_smoothed_source: false,
            higher_timeframe: Timeframe::from_minutes(240),
            chart_timeframe: Timeframe::from_minutes(60),
            stop_loss_percentage: dec!(0),
            take_profit_percentage: dec!(0),
            tsl_activation_percentage: dec!(0),
            tsl_callback_percentage: dec!(0),
            ticker: "BTCUSDT".to_string(),
            order_type: OrderType::Market,
            quantity: "0.0".to_string(),
            signal_prefix: "UTB".to_string(),
            risk_per_trade_percentage: dec!(0),
            amount_type: AmountType::Fixed,
            amount_value: dec!(1),
            initial_balance: dec!(10000),
            max_open_positions: 0,
            max_daily_loss_percentage: dec!(0),
            fee_rate: dec!(0),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any `UTBOT_*` variables present.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] but reading from an arbitrary source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |name: &str| {
            let key = format!("UTBOT_{}", name);
            lookup(&key).map(|v| (key, v)).filter(|(_, v)| !v.trim().is_empty())
        };

        if let Some((key, v)) = get("SENSITIVITY") {
            config.sensitivity = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("ATR_PERIOD") {
            config.atr_period = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("USE_SMOOTHED_SOURCE") {
            config.use_smoothed_source = parse_bool(&key, &v)?;
        }
        if let Some((key, v)) = get("HIGHER_TIMEFRAME") {
            config.higher_timeframe = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("CHART_TIMEFRAME") {
            config.chart_timeframe = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("STOP_LOSS_PERCENTAGE") {
            config.stop_loss_percentage = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("TAKE_PROFIT_PERCENTAGE") {
            config.take_profit_percentage = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("TSL_ACTIVATION_PERCENTAGE") {
            config.tsl_activation_percentage = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("TSL_CALLBACK_PERCENTAGE") {
            config.tsl_callback_percentage = parse(&key, &v)?;
        }
        if let Some((_, v)) = get("TICKER") {
            config.ticker = v.trim().to_string();
        }
        if let Some((key, v)) = get("ORDER_TYPE") {
            config.order_type = v.parse().with_context(|| format!("Invalid {}", key))?;
        }
        if let Some((_, v)) = get("QUANTITY") {
            config.quantity = v.trim().to_string();
        }
        if let Some((_, v)) = get("SIGNAL_PREFIX") {
            config.signal_prefix = v.trim().to_string();
        }
        if let Some((key, v)) = get("RISK_PER_TRADE_PERCENTAGE") {
            config.risk_per_trade_percentage = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("AMOUNT_TYPE") {
            config.amount_type = v.parse().with_context(|| format!("Invalid {}", key))?;
        }
        if let Some((key, v)) = get("AMOUNT_VALUE") {
            config.amount_value = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("INITIAL_BALANCE") {
            config.initial_balance = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("MAX_OPEN_POSITIONS") {
            config.max_open_positions = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("MAX_DAILY_LOSS_PERCENTAGE") {
            config.max_daily_loss_percentage = parse(&key, &v)?;
        }
        if let Some((key, v)) = get("FEE_RATE") {
            config.fee_rate = parse(&key, &v)?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sensitivity <= Decimal::ZERO {
            bail!("sensitivity must be positive, got {}", self.sensitivity);
        }
        if self.atr_period == 0 {
            bail!("atr_period must be at least 1");
        }

        let percentages = [
            ("stop_loss_percentage", self.stop_loss_percentage),
            ("take_profit_percentage", self.take_profit_percentage),
            ("tsl_activation_percentage", self.tsl_activation_percentage),
            ("tsl_callback_percentage", self.tsl_callback_percentage),
            ("risk_per_trade_percentage", self.risk_per_trade_percentage),
            ("amount_value", self.amount_value),
            ("max_daily_loss_percentage", self.max_daily_loss_percentage),
        ];
        for (name, value) in percentages {
            if value < Decimal::ZERO {
                bail!("{} must not be negative, got {}", name, value);
            }
        }

        if self.higher_timeframe < self.chart_timeframe {
            bail!(
                "higher_timeframe ({}) is shorter than chart_timeframe ({})",
                self.higher_timeframe,
                self.chart_timeframe
            );
        }
        if !self.higher_timeframe.is_multiple_of(&self.chart_timeframe) {
            warn!(
                htf = %self.higher_timeframe,
                chart = %self.chart_timeframe,
                "Higher timeframe is not a whole multiple of the chart timeframe"
            );
        }
        if self.initial_balance <= Decimal::ZERO {
            bail!("initial_balance must be positive, got {}", self.initial_balance);
        }
        if self.risk_per_trade_percentage.is_zero() && self.amount_value.is_zero() {
            warn!("Neither risk_per_trade_percentage nor amount_value is set; replays will not open positions");
        }
        if self.fee_rate < Decimal::ZERO {
            bail!("fee_rate must not be negative, got {}", self.fee_rate);
        }

        Ok(())
    }

    /// Whether the position trailing stop is configured.
    pub fn trailing_stop_enabled(&self) -> bool {
        self.tsl_activation_percentage > Decimal::ZERO && self.tsl_callback_percentage > Decimal::ZERO
    }

    /// The configured trade amount, if enabled.
    pub fn amount_limit(&self) -> Option<AmountLimit> {
        AmountLimit::new(self.amount_type, self.amount_value)
    }

    /// One-line summary for logs.
    pub fn digest(&self) -> String {
        format!(
            "ticker={} tf={} htf={} sensitivity={} atr_period={} ha={}",
            self.ticker,
            self.chart_timeframe,
            self.higher_timeframe,
            self.sensitivity,
            self.atr_period,
            self.use_smoothed_source
        )
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse::<T>()
        .with_context(|| format!("Invalid {}: '{}'", key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("Invalid {}: '{}'", key, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.sensitivity, dec!(1.0));
        assert_eq!(config.atr_period, 10);
        assert!(!config.use_smoothed_source);
        assert_eq!(config.higher_timeframe.to_string(), "240");
        assert_eq!(config.stop_loss_percentage, Decimal::ZERO);
        assert!(!config.trailing_stop_enabled());
        assert_eq!(config.amount_limit(), AmountLimit::new(AmountType::Fixed, dec!(1)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("UTBOT_SENSITIVITY", "2.5"),
            ("UTBOT_ATR_PERIOD", "14"),
            ("UTBOT_USE_SMOOTHED_SOURCE", "true"),
            ("UTBOT_HIGHER_TIMEFRAME", "1D"),
            ("UTBOT_ORDER_TYPE", "LIMIT"),
            ("UTBOT_TICKER", " ETHUSDT "),
            ("UTBOT_STOP_LOSS_PERCENTAGE", ""),
            ("UTBOT_RISK_PER_TRADE_PERCENTAGE", "1.5"),
            ("UTBOT_AMOUNT_TYPE", "quote_fixed"),
            ("UTBOT_AMOUNT_VALUE", "250"),
            ("UTBOT_MAX_OPEN_POSITIONS", "3"),
            ("UTBOT_MAX_DAILY_LOSS_PERCENTAGE", "5"),
        ]))
        .unwrap();

        assert_eq!(config.sensitivity, dec!(2.5));
        assert_eq!(config.atr_period, 14);
        assert!(config.use_smoothed_source);
        assert_eq!(config.higher_timeframe, Timeframe::from_minutes(1440));
        assert_eq!(config.order_type, OrderType::Limit);
        assert_eq!(config.ticker, "ETHUSDT");
        // Blank values keep the default
        assert_eq!(config.stop_loss_percentage, Decimal::ZERO);
        assert_eq!(config.risk_per_trade_percentage, dec!(1.5));
        assert_eq!(config.amount_limit(), AmountLimit::new(AmountType::QuoteFixed, dec!(250)));
        assert_eq!(config.max_open_positions, 3);
        assert_eq!(config.max_daily_loss_percentage, dec!(5));
        assert_eq!(config.initial_balance, dec!(10000));
    }

    #[test]
    fn test_env_parse_errors_name_the_variable() {
        let err = EngineConfig::from_lookup(lookup(&[("UTBOT_ATR_PERIOD", "ten")])).unwrap_err();
        assert!(err.to_string().contains("UTBOT_ATR_PERIOD"));

        let err = EngineConfig::from_lookup(lookup(&[("UTBOT_HIGHER_TIMEFRAME", "1M")])).unwrap_err();
        assert!(err.to_string().contains("UTBOT_HIGHER_TIMEFRAME"));
    }

    #[test]
    fn test_validation() {
        let mut config = EngineConfig::default();
        config.sensitivity = dec!(0);
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.stop_loss_percentage = dec!(-1);
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.higher_timeframe = Timeframe::from_minutes(15);
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.initial_balance = dec!(0);
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.max_daily_loss_percentage = dec!(-5);
        assert!(config.validate().is_err());

        // Sizing disabled is allowed, only warned about
        let mut config = EngineConfig::default();
        config.amount_value = dec!(0);
        assert!(config.validate().is_ok());
        assert_eq!(config.amount_limit(), None);

        let mut config = EngineConfig::default();
        config.tsl_activation_percentage = dec!(1);
        config.tsl_callback_percentage = dec!(0.5);
        assert!(config.validate().is_ok());
        assert!(config.trailing_stop_enabled());
    }
}
