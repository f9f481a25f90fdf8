//! Aggregates chart bars into higher-timeframe bars.
//!
//! Only closed bars are emitted. A bucket closes when the chart bar that
//! ends exactly at the bucket boundary arrives, or, if that bar is missing,
//! when the first bar of a later bucket arrives.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{Bar, Timeframe};

pub struct HtfResampler {
    htf: Timeframe,
    chart: Timeframe,
    /// Bar being built for the current bucket, keyed by bucket start
    building: Option<Bar>,
}

impl HtfResampler {
    pub fn new(htf: Timeframe, chart: Timeframe) -> Self {
        Self {
            htf,
            chart,
            building: None,
        }
    }

    /// Fold in a chart bar and return any higher-timeframe bars it closed,
    /// oldest first.
    pub fn add_bar(&mut self, bar: &Bar) -> Vec<Bar> {
        let bucket = self.htf.bucket_start(bar.time);
        let mut closed = Vec::new();

        if let Some(current) = self.building.take() {
            if current.time == bucket {
                self.building = Some(current);
            } else if current.time < bucket {
                // New bucket started before the old one saw its last bar
                closed.push(current);
            } else {
                debug!(time = %bar.time, bucket = %current.time, "Skipping out-of-order bar");
                self.building = Some(current);
                return closed;
            }
        }

        match self.building.as_mut() {
            Some(current) => {
                current.high = current.high.max(bar.high);
                current.low = current.low.min(bar.low);
                current.close = bar.close;
            }
            None => {
                self.building = Some(Bar::new(bucket, bar.open, bar.high, bar.low, bar.close));
            }
        }

        if self.closes_bucket(bar.time, bucket) {
            if let Some(done) = self.building.take() {
                closed.push(done);
            }
        }

        closed
    }

    /// Bucket ends out of calendar range never close on their own.
    fn closes_bucket(&self, bar_time: DateTime<Utc>, bucket: DateTime<Utc>) -> bool {
        let bar_end = bar_time.checked_add_signed(self.chart.duration());
        let bucket_end = bucket.checked_add_signed(self.htf.duration());
        match (bar_end, bucket_end) {
            (Some(bar_end), Some(bucket_end)) => bar_end >= bucket_end,
            _ => false,
        }
    }
}
