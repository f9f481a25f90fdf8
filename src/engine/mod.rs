//! Dual-timeframe trailing-stop signal engine.
//!
//! [`TrailingStopTracker`] runs one ATR trailing stop per channel,
//! [`SignalEngine`] combines the chart and higher-timeframe channels, and
//! [`SignalPipeline`] feeds both from raw bars.

mod pipeline;
mod resampler;
mod signal_engine;
mod trailing_stop;

pub use pipeline::SignalPipeline;
pub use resampler::HtfResampler;
pub use signal_engine::{combine, SignalEngine};
pub use trailing_stop::TrailingStopTracker;
