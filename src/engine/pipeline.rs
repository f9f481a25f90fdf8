//! Turns chart bars into engine samples.
//!
//! Each channel owns its ATR supplier and optionally reads the Heikin-Ashi
//! close instead of the chart close. The higher-timeframe channel only ever sees closed bars from
//! the resampler, so no bar looks ahead.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::indicators::{heikin_ashi_close, AtrSupplier};
use crate::models::{Bar, Direction, PriceSample, SignalEvent};

use super::{HtfResampler, SignalEngine};

struct Channel {
    atr: AtrSupplier,
    smoothed: bool,
}

impl Channel {
    fn new(atr_period: usize, smoothed: bool) -> Self {
        Self {
            atr: AtrSupplier::new(atr_period),
            smoothed,
        }
    }

    fn sample(&mut self, bar: &Bar) -> PriceSample {
        let atr = self.atr.update(bar);
        let source_price = if self.smoothed {
            heikin_ashi_close(bar)
        } else {
            bar.close
        };
        PriceSample::new(source_price, atr, bar.time.timestamp_millis())
    }
}

pub struct SignalPipeline {
    engine: SignalEngine,
    ltf: Channel,
    htf: Channel,
    resampler: HtfResampler,
    /// Last closed higher-timeframe sample, re-supplied until the next closes
    last_htf: Option<PriceSample>,
    last_bar_time: Option<DateTime<Utc>>,
}

impl SignalPipeline {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            engine: SignalEngine::new(config.sensitivity),
            ltf: Channel::new(config.atr_period, config.use_smoothed_source),
            htf: Channel::new(config.atr_period, config.use_smoothed_source),
            resampler: HtfResampler::new(config.higher_timeframe, config.chart_timeframe),
            last_htf: None,
            last_bar_time: None,
        }
    }

    pub fn direction(&self) -> Direction {
        self.engine.direction()
    }

    pub fn ltf_stop(&self) -> Option<Decimal> {
        self.engine.ltf_stop()
    }

    pub fn htf_stop(&self) -> Option<Decimal> {
        self.engine.htf_stop()
    }

    /// Feed one closed chart bar and return the resulting event.
    ///
    /// A bar not later than the previous one is dropped before it reaches
    /// any indicator.
    pub fn on_bar(&mut self, bar: &Bar) -> SignalEvent {
        if let Some(last) = self.last_bar_time {
            if bar.time <= last {
                warn!(time = %bar.time, last = %last, "Dropping repeated or out-of-order bar");
                return SignalEvent::None;
            }
        }
        self.last_bar_time = Some(bar.time);

        let closed = self.resampler.add_bar(bar);
        let ltf = self.ltf.sample(bar);

        // A gap can close more than one HTF bar at once; all but the last are
        // applied on their own so the HTF channel sees every bar.
        let mut closed = closed.into_iter().peekable();
        while let Some(htf_bar) = closed.next() {
            let sample = self.htf.sample(&htf_bar);
            debug!(time = %htf_bar.time, close = %htf_bar.close, "HTF bar closed");
            if closed.peek().is_some() {
                self.engine.apply_htf(&sample);
            }
            self.last_htf = Some(sample);
        }

        self.engine.on_sample(&ltf, self.last_htf.as_ref())
    }
}
