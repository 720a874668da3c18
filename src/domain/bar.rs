//! Price bar representation and series validation.

use chrono::NaiveDateTime;

use super::error::StratlabError;

/// One sampling interval of market data. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Validate a price series before any simulation touches it.
///
/// Requires a non-empty series, strictly increasing timestamps (no
/// duplicates), and strictly positive open/high/low/close on every bar.
pub fn validate_bars(bars: &[PriceBar]) -> Result<(), StratlabError> {
    if bars.is_empty() {
        return Err(StratlabError::EmptySeries);
    }

    for (i, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if let Some(&bad) = prices.iter().find(|p| !(**p > 0.0)) {
            return Err(StratlabError::NonPositivePrice {
                index: i,
                price: bad,
            });
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(StratlabError::NonMonotonicTimestamps { index: i });
        }
    }

    Ok(())
}

/// Close-to-close simple returns: `r[i] = close[i+1]/close[i] - 1`.
///
/// Length is `bars.len() - 1`. Assumes the series already passed
/// [`validate_bars`], so no division by zero can occur.
pub fn bar_returns(bars: &[PriceBar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| w[1].close / w[0].close - 1.0)
        .collect()
}
