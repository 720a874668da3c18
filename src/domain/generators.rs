//! Built-in signal generators.
//!
//! The engine treats every strategy as an opaque [`SignalGenerator`];
//! these are the implementations the CLI can construct by name, plus a
//! table-backed generator for signals precomputed outside the process.

use super::bar::PriceBar;
use super::error::StratlabError;
use super::signal::{Signal, SignalGenerator};

/// Moving-average crossover with positional state: buy the first bar the
/// short average is above the long one, sell the first bar it drops back
/// below, hold otherwise. Bars before the long window warms up are holds.
#[derive(Debug, Clone)]
pub struct SmaCrossover {
    pub short_period: usize,
    pub long_period: usize,
}

impl SmaCrossover {
    pub fn new(short_period: usize, long_period: usize) -> Result<Self, StratlabError> {
        if short_period == 0 || long_period == 0 || short_period >= long_period {
            return Err(StratlabError::SignalFailure {
                reason: format!(
                    "invalid SMA periods {short_period}/{long_period}: need 0 < short < long"
                ),
            });
        }
        Ok(SmaCrossover {
            short_period,
            long_period,
        })
    }
}

impl SignalGenerator for SmaCrossover {
    fn generate(&self, bars: &[PriceBar]) -> Result<Vec<Signal>, StratlabError> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let short_ma = rolling_mean(&closes, self.short_period);
        let long_ma = rolling_mean(&closes, self.long_period);

        let mut signals = Vec::with_capacity(bars.len());
        let mut long = false;
        for i in 0..bars.len() {
            let signal = match (short_ma[i], long_ma[i]) {
                (Some(short), Some(long_avg)) if short > long_avg && !long => {
                    long = true;
                    Signal::Buy
                }
                (Some(short), Some(long_avg)) if short < long_avg && long => {
                    long = false;
                    Signal::Sell
                }
                _ => Signal::Hold,
            };
            signals.push(signal);
        }
        Ok(signals)
    }
}

/// Buy on the first bar, hold forever. Replicates the benchmark; useful as
/// a baseline strategy in its own right.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuyAndHold;

impl SignalGenerator for BuyAndHold {
    fn generate(&self, bars: &[PriceBar]) -> Result<Vec<Signal>, StratlabError> {
        let mut signals = vec![Signal::Hold; bars.len()];
        if let Some(first) = signals.first_mut() {
            *first = Signal::Buy;
        }
        Ok(signals)
    }
}

/// Precomputed signal sequence, e.g. loaded from a CSV column.
///
/// Position-indexed, not price-sensitive: permutation trials replay the
/// same sequence against each synthetic path, which matches how an
/// externally supplied fixed signal table behaves.
#[derive(Debug, Clone)]
pub struct SignalTable {
    signals: Vec<Signal>,
}

impl SignalTable {
    pub fn new(signals: Vec<Signal>) -> Self {
        SignalTable { signals }
    }
}

impl SignalGenerator for SignalTable {
    fn generate(&self, bars: &[PriceBar]) -> Result<Vec<Signal>, StratlabError> {
        if self.signals.len() != bars.len() {
            return Err(StratlabError::SignalLengthMismatch {
                expected: bars.len(),
                actual: self.signals.len(),
            });
        }
        Ok(self.signals.clone())
    }
}

/// Rolling mean over `period` values; `None` until the window is full.
fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut window_sum = 0.0;
    for (i, &value) in values.iter().enumerate() {
        window_sum += value;
        if i >= period {
            window_sum -= values[i - period];
        }
        if i + 1 >= period {
            out.push(Some(window_sum / period as f64));
        } else {
            out.push(None);
        }
    }
    out
}
