//! Full-pipeline integration tests: data port → signal generation →
//! simulation → metrics → report assembly.

mod common;

use common::*;
use stratlab::domain::cancel::CancelToken;
use stratlab::domain::engine::{EngineConfig, run_engine, run_engine_with_progress};
use stratlab::domain::error::StratlabError;
use stratlab::domain::generators::{BuyAndHold, SignalTable, SmaCrossover};
use stratlab::domain::report::TestType;
use stratlab::domain::signal::Signal;
use stratlab::ports::data_port::DataPort;

fn engine_config(num_permutations: usize) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.permutation.num_permutations = num_permutations;
    config
}

#[test]
fn backtest_through_data_port() {
    let port = MockDataPort::with_bars(hourly_bars(&trending_closes(200)));
    let bars = port.fetch_bars(None, None).unwrap();

    let generator = SmaCrossover::new(5, 20).unwrap();
    let report = run_engine(
        &bars,
        &generator,
        TestType::Backtest,
        &engine_config(100),
        &CancelToken::new(),
    )
    .unwrap();

    assert!(report.success);
    assert_eq!(report.test_type, TestType::Backtest);
    assert_eq!(report.equity_curve.len(), 200);
    assert!(report.benchmark_curve.is_some());
    assert!(report.permutation_test.is_none());
    // An uptrend with a crossover strategy must trade at least once.
    assert!(report.total_trades >= 1);
    assert!(report.metrics.final_value > 0.0);
    assert!(report.metrics.benchmark.is_some());
    assert!(report.metrics.alpha.is_some());
}

#[test]
fn data_port_range_filter_reaches_engine() {
    let all = hourly_bars(&trending_closes(48));
    let port = MockDataPort::with_bars(all.clone());
    let start = all[24].timestamp;
    let bars = port.fetch_bars(Some(start), None).unwrap();
    assert_eq!(bars.len(), 24);

    let report = run_engine(
        &bars,
        &BuyAndHold,
        TestType::Backtest,
        &engine_config(100),
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(report.equity_curve.len(), 24);
}

#[test]
fn data_port_failure_propagates() {
    let port = MockDataPort::failing("connection dropped");
    let err = port.fetch_bars(None, None).unwrap_err();
    assert!(matches!(err, StratlabError::DataLoad { .. }));
}

#[test]
fn permutation_end_to_end_is_deterministic() {
    let bars = hourly_bars(&trending_closes(60));
    let generator = SmaCrossover::new(3, 10).unwrap();
    let config = engine_config(20);

    let first = run_engine(
        &bars,
        &generator,
        TestType::Permutation,
        &config,
        &CancelToken::new(),
    )
    .unwrap();
    let second = run_engine(
        &bars,
        &generator,
        TestType::Permutation,
        &config,
        &CancelToken::new(),
    )
    .unwrap();

    let a = first.permutation_test.unwrap();
    let b = second.permutation_test.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.num_permutations, 20);
    assert!((0.0..=1.0).contains(&a.p_value));
    assert!((0.0..=100.0).contains(&a.percentile));
}

#[test]
fn permutation_progress_reported_through_engine() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let bars = hourly_bars(&trending_closes(30));
    let seen = AtomicUsize::new(0);

    let report = run_engine_with_progress(
        &bars,
        &BuyAndHold,
        TestType::Permutation,
        &engine_config(10),
        &CancelToken::new(),
        |done, total| {
            assert!(done <= total);
            seen.fetch_max(done, Ordering::Relaxed);
        },
    )
    .unwrap();

    assert!(report.permutation_test.is_some());
    assert_eq!(seen.load(Ordering::Relaxed), 10);
}

#[test]
fn signal_table_replays_on_permutation_trials() {
    let bars = hourly_bars(&trending_closes(12));
    let mut signals = vec![Signal::Hold; 12];
    signals[0] = Signal::Buy;
    signals[11] = Signal::Sell;
    let table = SignalTable::new(signals);

    let report = run_engine(
        &bars,
        &table,
        TestType::Permutation,
        &engine_config(15),
        &CancelToken::new(),
    )
    .unwrap();

    let summary = report.permutation_test.unwrap();
    assert_eq!(summary.num_permutations, 15);
    assert_eq!(report.total_trades, 2);
}

#[test]
fn report_serializes_to_expected_envelope() {
    let bars = hourly_bars(&trending_closes(40));
    let report = run_engine(
        &bars,
        &BuyAndHold,
        TestType::Permutation,
        &engine_config(10),
        &CancelToken::new(),
    )
    .unwrap();

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["test_type"], "permutation");
    assert!(json["metrics"]["total_return"].is_number());
    assert!(json["metrics"]["benchmark"]["sharpe_ratio"].is_number());
    assert!(json["equity_curve"].is_array());
    assert!(json["benchmark_curve"].is_array());
    assert!(json["permutation_test"]["p_value"].is_number());
    assert!(json["permutation_test"]["significant"].is_boolean());
    assert!(json["total_trades"].is_number());
}

#[test]
fn empty_series_rejected_before_simulation() {
    let result = run_engine(
        &[],
        &BuyAndHold,
        TestType::Backtest,
        &engine_config(100),
        &CancelToken::new(),
    );
    assert!(matches!(result, Err(StratlabError::EmptySeries)));
}

#[test]
fn cancelled_token_stops_the_run() {
    let bars = hourly_bars(&trending_closes(40));
    let token = CancelToken::new();
    token.cancel();
    let result = run_engine(
        &bars,
        &BuyAndHold,
        TestType::Permutation,
        &engine_config(100),
        &token,
    );
    assert!(matches!(result, Err(StratlabError::Cancelled)));
}
