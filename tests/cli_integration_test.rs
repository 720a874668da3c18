//! End-to-end tests over real files: price CSVs, signal CSVs and INI
//! configs on disk, through the adapters into the engine.

mod common;

use common::*;
use stratlab::adapters::csv_adapter::{CsvBarAdapter, read_signal_column};
use stratlab::adapters::file_config_adapter::FileConfigAdapter;
use stratlab::adapters::json_report_adapter::JsonReportAdapter;
use stratlab::cli::parse_generator;
use stratlab::domain::cancel::CancelToken;
use stratlab::domain::engine::{EngineConfig, run_engine};
use stratlab::domain::generators::SignalTable;
use stratlab::domain::report::TestType;
use stratlab::domain::signal::validate_raw_signals;
use stratlab::ports::config_port::ConfigPort;
use stratlab::ports::data_port::DataPort;
use stratlab::ports::report_port::ReportPort;

#[test]
fn backtest_from_csv_to_json_file() {
    let bars = hourly_bars(&trending_closes(100));
    let prices = write_price_csv(&bars);

    let loaded = CsvBarAdapter::new(prices.path()).fetch_bars(None, None).unwrap();
    assert_eq!(loaded.len(), 100);

    let generator = parse_generator("sma:5,20").unwrap();
    let report = run_engine(
        &loaded,
        generator.as_ref(),
        TestType::Backtest,
        &EngineConfig::default(),
        &CancelToken::new(),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.json");
    JsonReportAdapter::to_file(&out).write(&report).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["test_type"], "backtest");
    assert_eq!(json["equity_curve"].as_array().unwrap().len(), 100);
}

#[test]
fn precomputed_signals_from_csv() {
    let bars = hourly_bars(&trending_closes(20));
    let prices = write_price_csv(&bars);

    let mut raw = vec![0i64; 20];
    raw[2] = 1;
    raw[15] = -1;
    let signals_file = write_signal_csv(&raw);

    let loaded = CsvBarAdapter::new(prices.path()).fetch_bars(None, None).unwrap();
    let raw_signals = read_signal_column(signals_file.path()).unwrap();
    let signals = validate_raw_signals(&raw_signals, &loaded).unwrap();
    let table = SignalTable::new(signals);

    let report = run_engine(
        &loaded,
        &table,
        TestType::Backtest,
        &EngineConfig::default(),
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(report.total_trades, 2);
    assert_eq!(report.trades[0].action, "BUY");
    assert_eq!(report.trades[1].action, "SELL");
}

#[test]
fn signal_file_shorter_than_prices_is_rejected() {
    let bars = hourly_bars(&trending_closes(20));
    let prices = write_price_csv(&bars);
    let signals_file = write_signal_csv(&[1, 0, -1]);

    let loaded = CsvBarAdapter::new(prices.path()).fetch_bars(None, None).unwrap();
    let raw = read_signal_column(signals_file.path()).unwrap();
    let err = validate_raw_signals(&raw, &loaded).unwrap_err();
    assert!(matches!(
        err,
        stratlab::domain::error::StratlabError::SignalLengthMismatch {
            expected: 20,
            actual: 3,
        }
    ));
}

#[test]
fn permutation_settings_flow_from_ini() {
    let ini = "\
[backtest]
initial_capital = 5000
timeframe = daily

[permutation]
num_permutations = 12
seed = 9
parallel = false
";
    let config = FileConfigAdapter::from_string(ini).unwrap();

    let bars = hourly_bars(&trending_closes(40));
    let engine_config = EngineConfig {
        initial_capital: config.get_double("backtest", "initial_capital", 10_000.0),
        periods_per_year: 252.0,
        permutation: stratlab::domain::permutation::PermutationConfig {
            num_permutations: config.get_int("permutation", "num_permutations", 100) as usize,
            seed: config.get_int("permutation", "seed", 42) as u64,
            parallel: config.get_bool("permutation", "parallel", true),
            ..Default::default()
        },
    };

    let generator = parse_generator("buy-hold").unwrap();
    let report = run_engine(
        &bars,
        generator.as_ref(),
        TestType::Permutation,
        &engine_config,
        &CancelToken::new(),
    )
    .unwrap();

    let summary = report.permutation_test.unwrap();
    assert_eq!(summary.num_permutations, 12);
    // 5000 initial capital carried all the way through.
    let first = &report.equity_curve[0];
    assert!((first.value - 5000.0).abs() < f64::EPSILON);
}

#[test]
fn config_file_on_disk_round_trips() {
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "[data]\nprices = data/btc.csv\n\n[permutation]\nnum_permutations = 77\n"
    )
    .unwrap();
    file.flush().unwrap();

    let config = FileConfigAdapter::from_file(file.path()).unwrap();
    assert_eq!(
        config.get_string("data", "prices"),
        Some("data/btc.csv".to_string())
    );
    assert_eq!(config.get_int("permutation", "num_permutations", 100), 77);
}
