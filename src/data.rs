//! Bar input: CSV files for replays and line-by-line streams for live use.
//!
//! Rows are `time,open,high,low,close`. `time` is epoch milliseconds or an
//! RFC 3339 timestamp and marks the bar open. A header row is optional.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use csv::StringRecord;
use rust_decimal::Decimal;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, warn};

use crate::models::Bar;
use crate::risk::to_decimal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BarParseError {
    #[error("expected 5 columns (time,open,high,low,close), got {0}")]
    ColumnCount(usize),

    #[error("invalid time '{0}'")]
    Time(String),

    #[error("invalid {field} '{value}'")]
    Price { field: &'static str, value: String },

    #[error("high {high} is below low {low}")]
    Range { high: Decimal, low: Decimal },
}

/// Parse a bar time: epoch milliseconds or RFC 3339.
pub fn parse_time(raw: &str) -> Result<DateTime<Utc>, BarParseError> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| BarParseError::Time(raw.to_string()));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| BarParseError::Time(raw.to_string()))
}

fn parse_price(field: &'static str, raw: &str) -> Result<Decimal, BarParseError> {
    to_decimal(raw).ok_or_else(|| BarParseError::Price {
        field,
        value: raw.trim().to_string(),
    })
}

/// Build a bar from one CSV record.
pub fn bar_from_record(record: &StringRecord) -> Result<Bar, BarParseError> {
    if record.len() != 5 {
        return Err(BarParseError::ColumnCount(record.len()));
    }

    let time = parse_time(&record[0])?;
    let open = parse_price("open", &record[1])?;
    let high = parse_price("high", &record[2])?;
    let low = parse_price("low", &record[3])?;
    let close = parse_price("close", &record[4])?;

    if high < low {
        return Err(BarParseError::Range { high, low });
    }

    Ok(Bar::new(time, open, high, low, close))
}

fn is_header(record: &StringRecord) -> bool {
    record
        .get(0)
        .map(|f| f.trim().eq_ignore_ascii_case("time"))
        .unwrap_or(false)
}

/// Parse a single CSV line. Blank lines and the header yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Bar>, BarParseError> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let record = StringRecord::from(line.split(',').collect::<Vec<_>>());
    if is_header(&record) {
        return Ok(None);
    }

    bar_from_record(&record).map(Some)
}

/// Read every bar from `reader`, sorted by time. Any bad row or a repeated
/// bar time is an error.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut rows: Vec<(usize, Bar)> = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let row = index + 1;
        let record = result.with_context(|| format!("CSV error on row {}", row))?;

        if row == 1 && is_header(&record) {
            continue;
        }

        let bar = bar_from_record(&record).with_context(|| format!("Bad bar on row {}", row))?;
        rows.push((row, bar));
    }

    rows.sort_by_key(|(_, bar)| bar.time);
    if let Some(pair) = rows.windows(2).find(|w| w[0].1.time == w[1].1.time) {
        let (first, second) = (pair[0].0.min(pair[1].0), pair[0].0.max(pair[1].0));
        bail!(
            "Duplicate bar time {} on rows {} and {}",
            pair[0].1.time.to_rfc3339(),
            first,
            second
        );
    }

    let bars: Vec<Bar> = rows.into_iter().map(|(_, bar)| bar).collect();
    debug!(count = bars.len(), "Loaded bars");
    Ok(bars)
}

pub fn load_bars(path: &Path) -> Result<Vec<Bar>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_bars(file).with_context(|| format!("Failed to load bars from {}", path.display()))
}

/// Bars arriving one CSV line at a time.
///
/// Malformed lines are logged and skipped so one bad row never ends the
/// stream.
pub struct BarStream<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl<R: AsyncBufRead + Unpin> BarStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    /// Next valid bar, or `None` at end of input.
    pub async fn next_bar(&mut self) -> Result<Option<Bar>> {
        while let Some(line) = self.lines.next_line().await.context("Failed to read input")? {
            self.line_no += 1;
            match parse_line(&line) {
                Ok(Some(bar)) => return Ok(Some(bar)),
                Ok(None) => continue,
                Err(e) => {
                    warn!(line = self.line_no, error = %e, "Skipping malformed bar");
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_time_formats() {
        let a = parse_time("1704067200000").unwrap();
        let b = parse_time("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(a, b);
        assert!(parse_time("yesterday").is_err());
    }

    #[test]
    fn test_parse_line() {
        let bar = parse_line("1704067200000, 10, 12, 9.5, 11").unwrap().unwrap();
        assert_eq!(bar.high, dec!(12));
        assert_eq!(bar.low, dec!(9.5));

        assert_eq!(parse_line("time,open,high,low,close").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("1,2,3"), Err(BarParseError::ColumnCount(3)));
        assert!(matches!(
            parse_line("1704067200000,10,abc,9,11"),
            Err(BarParseError::Price { field: "high", .. })
        ));
        assert!(matches!(
            parse_line("1704067200000,10,8,9,11"),
            Err(BarParseError::Range { .. })
        ));
    }

    #[test]
    fn test_read_bars_rejects_duplicate_times() {
        let csv = "time,open,high,low,close\n\
                   2024-01-01T00:00:00Z,1,1,1,1\n\
                   2024-01-01T01:00:00Z,2,2,2,2\n\
                   1704067200000,3,3,3,3\n";
        let err = read_bars(csv.as_bytes()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Duplicate bar time"), "{}", msg);
        assert!(msg.contains("rows 2 and 4"), "{}", msg);
    }

    #[test]
    fn test_read_bars_sorts_and_skips_header() {
        let csv = "time,open,high,low,close\n\
                   2024-01-01T01:00:00Z,2,2,2,2\n\
                   2024-01-01T00:00:00Z,1,1,1,1\n";
        let bars = read_bars(csv.as_bytes()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, dec!(1));
        assert_eq!(bars[1].close, dec!(2));
    }

    #[test]
    fn test_read_bars_reports_bad_row() {
        let csv = "1704067200000,1,1,1,1\n1704070800000,1,x,1,1\n";
        let err = read_bars(csv.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("row 2"));
    }

    #[tokio::test]
    async fn test_stream_skips_malformed_lines() {
        let input = tokio_test::io::Builder::new()
            .read(b"time,open,high,low,close\n1704067200000,1,2,1,2\n")
            .read(b"garbage\n1704070800000,2,3,2,3\n")
            .build();
        let mut stream = BarStream::new(tokio::io::BufReader::new(input));

        let first = stream.next_bar().await.unwrap().unwrap();
        assert_eq!(first.close, dec!(2));
        let second = stream.next_bar().await.unwrap().unwrap();
        assert_eq!(second.close, dec!(3));
        assert!(stream.next_bar().await.unwrap().is_none());
    }
}
