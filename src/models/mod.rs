//! Data models for bars, timeframes, signals, trades and positions.

mod bar;
mod position;
mod signal;
mod timeframe;
mod trade;

pub use bar::{Bar, PriceSample};
pub use position::{ExitReason, OpenPosition};
pub use signal::{Direction, RawCrossSignal, SignalEvent};
pub use timeframe::{Timeframe, TimeframeError};
pub use trade::{ClosedTrade, TradeSide};
