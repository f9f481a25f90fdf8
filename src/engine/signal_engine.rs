//! Combines the chart-timeframe crossover with the higher-timeframe regime.
//!
//! The higher timeframe only sets direction: a buy on the HTF channel latches
//! `Long`, a sell latches `Short`, and the latch holds until the opposite
//! signal. Chart-timeframe crossovers then open with the regime and close
//! against it.

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{Direction, PriceSample, RawCrossSignal, SignalEvent};

use super::TrailingStopTracker;

#[derive(Debug, Clone)]
pub struct SignalEngine {
    ltf: TrailingStopTracker,
    htf: TrailingStopTracker,
    direction: Direction,
}

impl SignalEngine {
    pub fn new(sensitivity: Decimal) -> Self {
        Self {
            ltf: TrailingStopTracker::new(sensitivity),
            htf: TrailingStopTracker::new(sensitivity),
            direction: Direction::Neutral,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn ltf_stop(&self) -> Option<Decimal> {
        self.ltf.current_value()
    }

    pub fn htf_stop(&self) -> Option<Decimal> {
        self.htf.current_value()
    }

    /// Evaluate one chart bar.
    ///
    /// `htf` is the most recently closed higher-timeframe sample, if any. It
    /// is applied to the direction latch before the chart signal is combined,
    /// so a flip and an open can happen on the same bar. Supplying the same
    /// HTF sample again is harmless.
    pub fn on_sample(&mut self, ltf: &PriceSample, htf: Option<&PriceSample>) -> SignalEvent {
        if let Some(htf) = htf {
            self.apply_htf(htf);
        }

        let raw = self.ltf.evaluate(ltf);
        let event = combine(raw, self.direction);

        if !event.is_none() {
            debug!(
                sequence = ltf.sequence,
                direction = %self.direction,
                event = %event,
                "Signal"
            );
        }

        event
    }

    /// Advance only the higher-timeframe channel and the direction latch.
    pub fn apply_htf(&mut self, htf: &PriceSample) -> Direction {
        let raw = self.htf.evaluate(htf);
        self.update_direction(raw, htf.sequence);
        self.direction
    }

    fn update_direction(&mut self, raw: RawCrossSignal, sequence: i64) {
        let next = if raw.buy {
            Direction::Long
        } else if raw.sell {
            Direction::Short
        } else {
            self.direction
        };

        if next != self.direction {
            debug!(sequence, from = %self.direction, to = %next, "HTF direction changed");
            self.direction = next;
        }
    }
}

/// Map a chart-timeframe crossover under the current regime to an event.
pub fn combine(raw: RawCrossSignal, direction: Direction) -> SignalEvent {
    match (raw.buy, raw.sell, direction) {
        (true, _, Direction::Long) => SignalEvent::OpenLong,
        (_, true, Direction::Short) => SignalEvent::OpenShort,
        (_, true, Direction::Long) => SignalEvent::CloseLong,
        (true, _, Direction::Short) => SignalEvent::CloseShort,
        _ => SignalEvent::None,
    }
}
