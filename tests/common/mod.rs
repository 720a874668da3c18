#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::io::Write;

use stratlab::domain::bar::PriceBar;
use stratlab::domain::error::StratlabError;
use stratlab::ports::data_port::DataPort;

pub fn base_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// One bar per hour, OHLC hung off the close.
pub fn hourly_bars(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            timestamp: base_time() + Duration::hours(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// A noisy uptrend long enough for moving-average strategies.
pub fn trending_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let trend = 100.0 + i as f64 * 0.5;
            let wobble = ((i % 7) as f64 - 3.0) * 0.8;
            trend + wobble
        })
        .collect()
}

pub struct MockDataPort {
    pub bars: Vec<PriceBar>,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn with_bars(bars: Vec<PriceBar>) -> Self {
        Self { bars, error: None }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            bars: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<PriceBar>, StratlabError> {
        if let Some(reason) = &self.error {
            return Err(StratlabError::DataLoad {
                reason: reason.clone(),
            });
        }
        Ok(self
            .bars
            .iter()
            .filter(|b| start.is_none_or(|s| b.timestamp >= s))
            .filter(|b| end.is_none_or(|e| b.timestamp <= e))
            .cloned()
            .collect())
    }
}

pub fn write_price_csv(bars: &[PriceBar]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "ts_event,open,high,low,close,volume").unwrap();
    for bar in bars {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            bar.timestamp.format("%Y-%m-%d %H:%M:%S"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume,
        )
        .unwrap();
    }
    file.flush().unwrap();
    file
}

pub fn write_signal_csv(signals: &[i64]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "signal").unwrap();
    for s in signals {
        writeln!(file, "{s}").unwrap();
    }
    file.flush().unwrap();
    file
}
