//! CSV file data adapter.
//!
//! Loads price bars from CSV exports. The timestamp column may be named
//! `ts_event`, `timestamp` or `date` (the formats seen in practice);
//! rows are sorted by timestamp after loading, so unsorted exports are
//! accepted. Also reads precomputed signal columns for table-driven
//! strategies.

use chrono::{NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};

use crate::domain::bar::PriceBar;
use crate::domain::error::StratlabError;
use crate::ports::data_port::DataPort;

const TIMESTAMP_COLUMNS: [&str; 3] = ["ts_event", "timestamp", "date"];

pub struct CsvBarAdapter {
    path: PathBuf,
}

impl CsvBarAdapter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DataPort for CsvBarAdapter {
    fn fetch_bars(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<PriceBar>, StratlabError> {
        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| StratlabError::DataLoad {
            reason: format!("failed to open {}: {}", self.path.display(), e),
        })?;

        let headers = rdr
            .headers()
            .map_err(|e| StratlabError::DataLoad {
                reason: format!("CSV header error: {e}"),
            })?
            .clone();

        let ts_col = TIMESTAMP_COLUMNS
            .iter()
            .find_map(|name| column_index(&headers, name))
            .ok_or_else(|| StratlabError::DataLoad {
                reason: "no timestamp column (expected ts_event, timestamp or date)".into(),
            })?;
        let open_col = require_column(&headers, "open")?;
        let high_col = require_column(&headers, "high")?;
        let low_col = require_column(&headers, "low")?;
        let close_col = require_column(&headers, "close")?;
        let volume_col = require_column(&headers, "volume")?;

        let mut bars = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| StratlabError::DataLoad {
                reason: format!("CSV parse error at row {}: {}", row + 1, e),
            })?;

            let timestamp = parse_timestamp(field(&record, ts_col, row, "timestamp")?)?;
            if let Some(start) = start {
                if timestamp < start {
                    continue;
                }
            }
            if let Some(end) = end {
                if timestamp > end {
                    continue;
                }
            }

            bars.push(PriceBar {
                timestamp,
                open: parse_number(&record, open_col, row, "open")?,
                high: parse_number(&record, high_col, row, "high")?,
                low: parse_number(&record, low_col, row, "low")?,
                close: parse_number(&record, close_col, row, "close")?,
                volume: parse_number(&record, volume_col, row, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

/// Read a precomputed `signal` column of integers in {-1, 0, 1}. Values
/// are validated against the price series later, at generation time.
pub fn read_signal_column<P: AsRef<Path>>(path: P) -> Result<Vec<i64>, StratlabError> {
    let path = path.as_ref();
    let mut rdr = csv::Reader::from_path(path).map_err(|e| StratlabError::DataLoad {
        reason: format!("failed to open {}: {}", path.display(), e),
    })?;

    let headers = rdr
        .headers()
        .map_err(|e| StratlabError::DataLoad {
            reason: format!("CSV header error: {e}"),
        })?
        .clone();
    let signal_col = require_column(&headers, "signal")?;

    let mut signals = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| StratlabError::DataLoad {
            reason: format!("CSV parse error at row {}: {}", row + 1, e),
        })?;
        let raw = field(&record, signal_col, row, "signal")?;
        let value: i64 = raw.trim().parse().map_err(|_| StratlabError::DataLoad {
            reason: format!("invalid signal value {:?} at row {}", raw, row + 1),
        })?;
        signals.push(value);
    }
    Ok(signals)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.eq_ignore_ascii_case(name))
}

fn require_column(headers: &csv::StringRecord, name: &str) -> Result<usize, StratlabError> {
    column_index(headers, name).ok_or_else(|| StratlabError::DataLoad {
        reason: format!("missing {name} column"),
    })
}

fn field<'a>(
    record: &'a csv::StringRecord,
    index: usize,
    row: usize,
    name: &str,
) -> Result<&'a str, StratlabError> {
    record.get(index).ok_or_else(|| StratlabError::DataLoad {
        reason: format!("missing {} value at row {}", name, row + 1),
    })
}

fn parse_number(
    record: &csv::StringRecord,
    index: usize,
    row: usize,
    name: &str,
) -> Result<f64, StratlabError> {
    let raw = field(record, index, row, name)?;
    raw.trim().parse().map_err(|_| StratlabError::DataLoad {
        reason: format!("invalid {} value {:?} at row {}", name, raw, row + 1),
    })
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, StratlabError> {
    let raw = raw.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(ts);
    }
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.naive_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }
    Err(StratlabError::DataLoad {
        reason: format!("unrecognized timestamp {raw:?}"),
    })
}
