//! Risk arithmetic: protective prices, P&L, sizing, trailing stops and
//! decimal display.
//!
//! Everything here is pure and stateless except [`PercentTrailingStop`],
//! owned by a single position, and [`RiskGate`], owned by an account.

mod arithmetic;
mod format;
mod gate;
mod sizing;
mod trailing;

pub use arithmetic::{
    pnl, pnl_from_str, return_pct, stop_loss_price, take_profit_price, to_decimal, RiskRequest,
};
pub use format::{quantize, quantize_opt, quantize_str, RoundingMode, NOT_AVAILABLE};
pub use gate::RiskGate;
pub use sizing::{position_size, AmountLimit, AmountType};
pub use trailing::PercentTrailingStop;
