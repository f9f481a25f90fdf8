//! ATR trailing stop for a single channel.
//!
//! The stop ratchets in the direction of the trend and flips to the other
//! side of price when the trend reverses:
//!
//! - up & was up: max(prev_stop, src - noise)
//! - down & was down: min(prev_stop, src + noise)
//! - reversal up: src - noise
//! - reversal down: src + noise
//!
//! where noise = sensitivity * atr.

use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::indicators::{crossover, crossunder};
use crate::models::{PriceSample, RawCrossSignal};

#[derive(Debug, Clone)]
pub struct TrailingStopTracker {
    sensitivity: Decimal,

    /// `None` until the first sample has been processed
    current_value: Option<Decimal>,
    prev_source: Option<Decimal>,
    last_sequence: Option<i64>,
}

impl TrailingStopTracker {
    pub fn new(sensitivity: Decimal) -> Self {
        Self {
            sensitivity,
            current_value: None,
            prev_source: None,
            last_sequence: None,
        }
    }

    pub fn current_value(&self) -> Option<Decimal> {
        self.current_value
    }

    /// Advance the stop with one sample and report the crossover it caused.
    ///
    /// Stale or repeated samples (sequence not above the last one) leave the
    /// state untouched and yield no signal.
    pub fn evaluate(&mut self, sample: &PriceSample) -> RawCrossSignal {
        if let Some(last) = self.last_sequence {
            if sample.sequence <= last {
                debug!(sequence = sample.sequence, last, "Skipping stale sample");
                return RawCrossSignal::NONE;
            }
        }

        let src = sample.source_price;
        let prev_src = self.prev_source.unwrap_or(src);
        let prev_stop = self.current_value.unwrap_or(Decimal::ZERO);
        let atr = sample.atr.unwrap_or(Decimal::ZERO).max(Decimal::ZERO);
        let noise = self.sensitivity * atr;

        let stop = next_stop(src, prev_src, prev_stop, noise);

        trace!(
            sequence = sample.sequence,
            src = %src,
            atr = %atr,
            prev_stop = %prev_stop,
            stop = %stop,
            "Trailing stop updated"
        );

        // The first sample has nothing to cross from
        let signal = if self.prev_source.is_some() {
            RawCrossSignal {
                buy: crossover(prev_src, prev_stop, src, stop) && src > stop,
                sell: crossunder(prev_src, prev_stop, src, stop) && src < stop,
            }
        } else {
            RawCrossSignal::NONE
        };

        self.current_value = Some(stop);
        self.prev_source = Some(src);
        self.last_sequence = Some(sample.sequence);

        signal
    }
}

fn next_stop(src: Decimal, prev_src: Decimal, prev_stop: Decimal, noise: Decimal) -> Decimal {
    if src > prev_stop && prev_src > prev_stop {
        prev_stop.max(src - noise)
    } else if src < prev_stop && prev_src < prev_stop {
        prev_stop.min(src + noise)
    } else if src > prev_stop {
        src - noise
    } else {
        src + noise
    }
}
