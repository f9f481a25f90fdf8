//! Outbound alert messages for signal events.
//!
//! Messages are only built and serialized here; delivery belongs to whatever
//! consumes the JSON.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, OrderType};
use crate::models::{SignalEvent, TradeSide};
use crate::risk;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertAction {
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub action: AlertAction,

    /// Only present on opens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<TradeSide>,

    pub ticker: String,
    pub order_type: OrderType,
    pub quantity: String,
    pub signal_id: String,

    /// Protective levels from the bar close, when configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<Decimal>,
}

impl AlertMessage {
    /// Build the alert for `event`, or `None` when there is nothing to send.
    ///
    /// `price` is the bar close the event fired on; it only feeds the
    /// stop-loss and take-profit levels of opening alerts.
    pub fn from_event(event: SignalEvent, config: &EngineConfig, price: Decimal) -> Option<Self> {
        let (action, side) = match event {
            SignalEvent::OpenLong => (AlertAction::Open, Some(TradeSide::Buy)),
            SignalEvent::OpenShort => (AlertAction::Open, Some(TradeSide::Sell)),
            SignalEvent::CloseLong | SignalEvent::CloseShort => (AlertAction::Close, None),
            SignalEvent::None => return None,
        };

        let (stop_loss, take_profit) = match side {
            Some(side) => (
                risk::stop_loss_price(price, config.stop_loss_percentage, side),
                risk::take_profit_price(price, config.take_profit_percentage, side),
            ),
            None => (None, None),
        };

        Some(Self {
            action,
            side,
            ticker: config.ticker.clone(),
            order_type: config.order_type,
            quantity: config.quantity.clone(),
            signal_id: format!("{}_{}", config.signal_prefix, event.code()),
            stop_loss,
            take_profit,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize alert")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::Value;

    #[test]
    fn test_open_alerts_carry_side() {
        let config = EngineConfig::default();

        let long = AlertMessage::from_event(SignalEvent::OpenLong, &config, dec!(100)).unwrap();
        assert_eq!(long.action, AlertAction::Open);
        assert_eq!(long.side, Some(TradeSide::Buy));
        assert_eq!(long.signal_id, "UTB_OPEN_LONG");

        let short = AlertMessage::from_event(SignalEvent::OpenShort, &config, dec!(100)).unwrap();
        assert_eq!(short.side, Some(TradeSide::Sell));
        assert_eq!(short.signal_id, "UTB_OPEN_SHORT");
    }

    #[test]
    fn test_close_alerts_omit_side() {
        let config = EngineConfig::default();
        let msg = AlertMessage::from_event(SignalEvent::CloseShort, &config, dec!(100)).unwrap();
        assert_eq!(msg.action, AlertAction::Close);
        assert_eq!(msg.side, None);
        assert_eq!(msg.signal_id, "UTB_CLOSE_SHORT");

        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["action"], "close");
        assert!(json.get("side").is_none());
        assert!(json.get("stop_loss").is_none());
    }

    #[test]
    fn test_none_event_has_no_alert() {
        assert!(AlertMessage::from_event(SignalEvent::None, &EngineConfig::default(), dec!(1)).is_none());
    }

    #[test]
    fn test_json_shape() {
        let config = EngineConfig {
            stop_loss_percentage: dec!(2),
            take_profit_percentage: dec!(4),
            order_type: OrderType::Limit,
            ..EngineConfig::default()
        };
        let msg = AlertMessage::from_event(SignalEvent::OpenShort, &config, dec!(100)).unwrap();
        let json: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(json["action"], "open");
        assert_eq!(json["side"], "sell");
        assert_eq!(json["ticker"], "BTCUSDT");
        assert_eq!(json["order_type"], "limit");
        assert_eq!(json["quantity"], "0.0");
        let level = |key: &str| json[key].as_str().and_then(|s| s.parse::<Decimal>().ok());
        assert_eq!(level("stop_loss"), Some(dec!(102)));
        assert_eq!(level("take_profit"), Some(dec!(96)));
    }
}
