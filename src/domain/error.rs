//! Domain error types.

/// Top-level error type for stratlab.
///
/// Every failure the engine can produce is one of these variants; the
/// boundary converts them into the structured JSON failure envelope rather
/// than letting anything escape as a panic.
#[derive(Debug, thiserror::Error)]
pub enum StratlabError {
    #[error("price series is empty")]
    EmptySeries,

    #[error("non-monotonic timestamp at bar {index}")]
    NonMonotonicTimestamps { index: usize },

    #[error("non-positive price {price} at bar {index}")]
    NonPositivePrice { index: usize, price: f64 },

    #[error("signal generator returned {actual} signals for {expected} bars")]
    SignalLengthMismatch { expected: usize, actual: usize },

    #[error("invalid signal value {value} at index {index}: must be -1, 0 or 1")]
    InvalidSignalValue { index: usize, value: i64 },

    #[error("signal generator failed: {reason}")]
    SignalFailure { reason: String },

    #[error("run cancelled")]
    Cancelled,

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data load error: {reason}")]
    DataLoad { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StratlabError {
    /// Whether this error is a cancellation rather than a computational
    /// failure. Callers distinguish "told to stop" from "wrong".
    pub fn is_cancelled(&self) -> bool {
        matches!(self, StratlabError::Cancelled)
    }
}

impl From<&StratlabError> for std::process::ExitCode {
    fn from(err: &StratlabError) -> Self {
        let code: u8 = match err {
            StratlabError::Io(_) => 1,
            StratlabError::ConfigParse { .. } | StratlabError::ConfigInvalid { .. } => 2,
            StratlabError::EmptySeries
            | StratlabError::NonMonotonicTimestamps { .. }
            | StratlabError::NonPositivePrice { .. }
            | StratlabError::DataLoad { .. } => 3,
            StratlabError::SignalLengthMismatch { .. }
            | StratlabError::InvalidSignalValue { .. }
            | StratlabError::SignalFailure { .. } => 4,
            StratlabError::Cancelled => 5,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = StratlabError::SignalLengthMismatch {
            expected: 100,
            actual: 99,
        };
        assert_eq!(
            err.to_string(),
            "signal generator returned 99 signals for 100 bars"
        );

        let err = StratlabError::NonPositivePrice {
            index: 3,
            price: -1.5,
        };
        assert_eq!(err.to_string(), "non-positive price -1.5 at bar 3");
    }

    #[test]
    fn cancelled_is_distinct() {
        assert!(StratlabError::Cancelled.is_cancelled());
        assert!(!StratlabError::EmptySeries.is_cancelled());
    }
}
