//! Engine entry point: validate → generate → simulate → measure → assemble.
//!
//! This is the seam the transport layer calls. Everything below it is pure
//! computation over caller-owned data; everything above it (request
//! handling, sandboxing of user code, storage) is someone else's problem.

use super::bar::{PriceBar, validate_bars};
use super::cancel::CancelToken;
use super::error::StratlabError;
use super::metrics::{Metrics, PERIODS_PER_YEAR_HOURLY};
use super::permutation::{PermutationConfig, run_permutation_test_with_progress};
use super::report::{BacktestReport, TestType};
use super::signal::{SignalGenerator, generate_validated};
use super::simulator::{DEFAULT_INITIAL_CAPITAL, buy_and_hold, run_simulation};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub initial_capital: f64,
    pub periods_per_year: f64,
    pub permutation: PermutationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            periods_per_year: PERIODS_PER_YEAR_HOURLY,
            permutation: PermutationConfig::default(),
        }
    }
}

/// Run a full backtest or permutation test over an already-loaded price
/// series and an already-constructed signal generator.
pub fn run_engine(
    bars: &[PriceBar],
    generator: &dyn SignalGenerator,
    mode: TestType,
    config: &EngineConfig,
    cancel: &CancelToken,
) -> Result<BacktestReport, StratlabError> {
    run_engine_with_progress(bars, generator, mode, config, cancel, |_, _| {})
}

/// As [`run_engine`], reporting permutation-trial progress through the
/// callback.
pub fn run_engine_with_progress<F>(
    bars: &[PriceBar],
    generator: &dyn SignalGenerator,
    mode: TestType,
    config: &EngineConfig,
    cancel: &CancelToken,
    progress: F,
) -> Result<BacktestReport, StratlabError>
where
    F: Fn(usize, usize) + Send + Sync,
{
    if !(config.initial_capital > 0.0) {
        return Err(StratlabError::ConfigInvalid {
            section: "backtest".into(),
            key: "initial_capital".into(),
            reason: format!("must be positive, got {}", config.initial_capital),
        });
    }
    validate_bars(bars)?;

    let signals = generate_validated(generator, bars)?;
    let (equity_curve, trades) = run_simulation(bars, &signals, config.initial_capital, cancel)?;
    let benchmark_curve = buy_and_hold(bars, config.initial_capital, cancel)?;

    let metrics = Metrics::compute(
        &equity_curve,
        &trades,
        Some(&benchmark_curve),
        config.periods_per_year,
    );

    let permutation_test = match mode {
        TestType::Backtest => None,
        TestType::Permutation => Some(run_permutation_test_with_progress(
            bars,
            generator,
            config.initial_capital,
            &config.permutation,
            cancel,
            progress,
        )?),
    };

    Ok(BacktestReport::assemble(
        mode,
        &metrics,
        &equity_curve,
        Some(&benchmark_curve),
        &trades,
        permutation_test,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generators::{BuyAndHold, SignalTable};
    use crate::domain::signal::Signal;
    use chrono::NaiveDate;

    fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PriceBar {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
                    + chrono::Duration::hours(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 100.0,
            })
            .collect()
    }

    fn config() -> EngineConfig {
        EngineConfig {
            initial_capital: 1000.0,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn backtest_mode_produces_full_report() {
        let bars = make_bars(&[100.0, 110.0, 121.0]);
        let table = SignalTable::new(vec![Signal::Buy, Signal::Hold, Signal::Hold]);
        let report = run_engine(
            &bars,
            &table,
            TestType::Backtest,
            &config(),
            &CancelToken::new(),
        )
        .unwrap();

        assert!(report.success);
        assert_eq!(report.test_type, TestType::Backtest);
        assert!((report.metrics.total_return - 21.0).abs() < 1e-9);
        assert_eq!(report.equity_curve.len(), 3);
        assert!(report.benchmark_curve.is_some());
        assert!(report.permutation_test.is_none());
        assert_eq!(report.total_trades, 1);
        // Strategy equals buy-and-hold here, so alpha is zero.
        assert!((report.metrics.alpha.unwrap() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn permutation_mode_attaches_summary() {
        let bars = make_bars(&[
            100.0, 102.0, 99.0, 104.0, 101.0, 107.0, 103.0, 111.0, 108.0, 115.0,
        ]);
        let mut cfg = config();
        cfg.permutation.num_permutations = 10;
        cfg.permutation.parallel = false;

        let report = run_engine(
            &bars,
            &BuyAndHold,
            TestType::Permutation,
            &cfg,
            &CancelToken::new(),
        )
        .unwrap();

        let summary = report.permutation_test.unwrap();
        assert_eq!(summary.num_permutations, 10);
        assert_eq!(report.test_type, TestType::Permutation);
    }

    #[test]
    fn invalid_prices_refused_before_strategy_runs() {
        let mut bars = make_bars(&[100.0, 110.0]);
        bars[1].close = -1.0;
        let result = run_engine(
            &bars,
            &BuyAndHold,
            TestType::Backtest,
            &config(),
            &CancelToken::new(),
        );
        assert!(matches!(
            result,
            Err(StratlabError::NonPositivePrice { index: 1, .. })
        ));
    }

    #[test]
    fn nonpositive_capital_refused() {
        let bars = make_bars(&[100.0, 110.0]);
        let mut cfg = config();
        cfg.initial_capital = 0.0;
        let result = run_engine(
            &bars,
            &BuyAndHold,
            TestType::Backtest,
            &cfg,
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(StratlabError::ConfigInvalid { .. })));
    }

    #[test]
    fn signal_shape_mismatch_surfaces() {
        let bars = make_bars(&[100.0, 110.0, 121.0]);
        let table = SignalTable::new(vec![Signal::Buy]);
        let result = run_engine(
            &bars,
            &table,
            TestType::Backtest,
            &config(),
            &CancelToken::new(),
        );
        assert!(matches!(
            result,
            Err(StratlabError::SignalLengthMismatch { .. })
        ));
    }

    #[test]
    fn cancellation_yields_no_report() {
        let bars = make_bars(&[100.0, 110.0, 121.0]);
        let token = CancelToken::new();
        token.cancel();
        let result = run_engine(&bars, &BuyAndHold, TestType::Backtest, &config(), &token);
        assert!(matches!(result, Err(StratlabError::Cancelled)));
    }
}
