//! Trading signals and the signal generator seam.

use super::bar::PriceBar;
use super::error::StratlabError;

/// Per-bar trading instruction, aligned one-to-one with the price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Sell,
    Hold,
    Buy,
}

impl Signal {
    pub fn as_i8(self) -> i8 {
        match self {
            Signal::Sell => -1,
            Signal::Hold => 0,
            Signal::Buy => 1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Signal> {
        match value {
            -1 => Some(Signal::Sell),
            0 => Some(Signal::Hold),
            1 => Some(Signal::Buy),
            _ => None,
        }
    }
}

/// The user-supplied strategy, seen by the engine as an opaque callable.
///
/// Implementations map a price series to a same-length signal sequence.
/// The engine trusts nothing about the output beyond what
/// [`generate_validated`] checks, and treats any `Err` as a strategy
/// failure. `Send + Sync` so permutation trials can invoke the generator
/// from worker threads.
pub trait SignalGenerator: Send + Sync {
    fn generate(&self, bars: &[PriceBar]) -> Result<Vec<Signal>, StratlabError>;
}

impl<F> SignalGenerator for F
where
    F: Fn(&[PriceBar]) -> Result<Vec<Signal>, StratlabError> + Send + Sync,
{
    fn generate(&self, bars: &[PriceBar]) -> Result<Vec<Signal>, StratlabError> {
        self(bars)
    }
}

/// Check that a raw signal sequence has the right shape for a price series.
///
/// Used by adapters that receive signals as plain integers (e.g. from a
/// CSV column); generators that construct [`Signal`] values directly only
/// need the length check in [`generate_validated`].
pub fn validate_raw_signals(raw: &[i64], bars: &[PriceBar]) -> Result<Vec<Signal>, StratlabError> {
    if raw.len() != bars.len() {
        return Err(StratlabError::SignalLengthMismatch {
            expected: bars.len(),
            actual: raw.len(),
        });
    }
    raw.iter()
        .enumerate()
        .map(|(index, &value)| {
            Signal::from_i64(value).ok_or(StratlabError::InvalidSignalValue { index, value })
        })
        .collect()
}

/// Invoke a generator and enforce the output contract.
pub fn generate_validated(
    generator: &dyn SignalGenerator,
    bars: &[PriceBar],
) -> Result<Vec<Signal>, StratlabError> {
    let signals = generator.generate(bars)?;
    if signals.len() != bars.len() {
        return Err(StratlabError::SignalLengthMismatch {
            expected: bars.len(),
            actual: signals.len(),
        });
    }
    Ok(signals)
}
