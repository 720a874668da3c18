//! CLI definition and dispatch.

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvBarAdapter, read_signal_column};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::bar::{PriceBar, validate_bars};
use crate::domain::cancel::CancelToken;
use crate::domain::engine::{EngineConfig, run_engine_with_progress};
use crate::domain::error::StratlabError;
use crate::domain::generators::{BuyAndHold, SignalTable, SmaCrossover};
use crate::domain::metrics::{PERIODS_PER_YEAR_DAILY, PERIODS_PER_YEAR_HOURLY};
use crate::domain::permutation::{
    DEFAULT_NUM_PERMUTATIONS, DEFAULT_SEED, PermutationConfig, Resampling,
};
use crate::domain::report::{FailureReport, TestType};
use crate::domain::signal::{SignalGenerator, validate_raw_signals};
use crate::domain::simulator::DEFAULT_INITIAL_CAPITAL;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "stratlab", about = "Strategy backtester and permutation tester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest against historical prices
    Backtest {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        prices: Option<PathBuf>,
        /// CSV with a precomputed signal column
        #[arg(short, long)]
        signals: Option<PathBuf>,
        /// Built-in generator spec (buy-hold, sma:SHORT,LONG)
        #[arg(short, long)]
        generator: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run a permutation test of strategy significance
    Permutation {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        prices: Option<PathBuf>,
        #[arg(short, long)]
        signals: Option<PathBuf>,
        #[arg(short, long)]
        generator: Option<String>,
        #[arg(short = 'n', long)]
        permutations: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a price CSV without running a strategy
    Validate {
        #[arg(short, long)]
        prices: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            prices,
            signals,
            generator,
            output,
        } => run_test(
            TestType::Backtest,
            config.as_ref(),
            prices.as_ref(),
            signals.as_ref(),
            generator.as_deref(),
            None,
            None,
            output.as_ref(),
        ),
        Command::Permutation {
            config,
            prices,
            signals,
            generator,
            permutations,
            seed,
            output,
        } => run_test(
            TestType::Permutation,
            config.as_ref(),
            prices.as_ref(),
            signals.as_ref(),
            generator.as_deref(),
            permutations,
            seed,
            output.as_ref(),
        ),
        Command::Validate { prices } => run_validate(&prices),
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

#[allow(clippy::too_many_arguments)]
fn run_test(
    mode: TestType,
    config_path: Option<&PathBuf>,
    prices_override: Option<&PathBuf>,
    signals_override: Option<&PathBuf>,
    generator_override: Option<&str>,
    permutations_override: Option<usize>,
    seed_override: Option<u64>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: Load config (optional; flags can carry everything)
    let config: Option<FileConfigAdapter> = match config_path {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            match load_config(path) {
                Ok(c) => Some(c),
                Err(code) => return code,
            }
        }
        None => None,
    };
    let config_ref = config.as_ref().map(|c| c as &dyn ConfigPort);

    match run_test_inner(
        mode,
        config_ref,
        prices_override,
        signals_override,
        generator_override,
        permutations_override,
        seed_override,
        output_path,
    ) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            println!("{}", FailureReport::from(&e).to_json());
            ExitCode::from(&e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_test_inner(
    mode: TestType,
    config: Option<&dyn ConfigPort>,
    prices_override: Option<&PathBuf>,
    signals_override: Option<&PathBuf>,
    generator_override: Option<&str>,
    permutations_override: Option<usize>,
    seed_override: Option<u64>,
    output_path: Option<&PathBuf>,
) -> Result<ExitCode, StratlabError> {
    // Stage 2: Load price bars
    let bars = load_bars(config, prices_override)?;
    eprintln!("Loaded {} bars", bars.len());

    // Stage 3: Resolve the signal source
    let generator = build_generator(config, signals_override, generator_override, &bars)?;

    // Stage 4: Build engine config
    let engine_config = build_engine_config(config, permutations_override, seed_override)?;
    if mode == TestType::Permutation {
        eprintln!(
            "Running permutation test: {} trials, seed {}",
            engine_config.permutation.num_permutations, engine_config.permutation.seed,
        );
    } else {
        eprintln!("Running backtest");
    }

    // Stage 5: Run the engine
    let cancel = CancelToken::new();
    let report = run_engine_with_progress(
        &bars,
        generator.as_ref(),
        mode,
        &engine_config,
        &cancel,
        |done, total| {
            if done % 25 == 0 || done == total {
                eprintln!("  permutation {done}/{total}");
            }
        },
    )?;

    // Stage 6: Console summary and JSON output
    eprintln!("Total Return:  {:.2}%", report.metrics.total_return);
    eprintln!("Sharpe Ratio:  {:.3}", report.metrics.sharpe_ratio);
    eprintln!("Max Drawdown:  {:.2}%", report.metrics.max_drawdown);
    eprintln!("Total Trades:  {}", report.total_trades);
    if let Some(summary) = &report.permutation_test {
        eprintln!("P-Value:       {:.4}", summary.p_value);
        eprintln!("Percentile:    {:.1}", summary.percentile);
        eprintln!(
            "Significant:   {}",
            if summary.significant { "yes" } else { "no" }
        );
    }

    let writer = match output_path {
        Some(path) => JsonReportAdapter::to_file(path),
        None => JsonReportAdapter::to_stdout(),
    };
    writer.write(&report)?;
    if let Some(path) = output_path {
        eprintln!("Report written to {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

fn run_validate(prices: &PathBuf) -> ExitCode {
    eprintln!("Validating {}", prices.display());
    let adapter = CsvBarAdapter::new(prices);
    let result = adapter.fetch_bars(None, None).and_then(|bars| {
        validate_bars(&bars)?;
        Ok(bars)
    });
    match result {
        Ok(bars) => {
            eprintln!(
                "{} bars, {} to {}",
                bars.len(),
                bars[0].timestamp,
                bars[bars.len() - 1].timestamp,
            );
            eprintln!("Price series is valid");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

fn load_bars(
    config: Option<&dyn ConfigPort>,
    prices_override: Option<&PathBuf>,
) -> Result<Vec<PriceBar>, StratlabError> {
    let path = match prices_override {
        Some(p) => p.clone(),
        None => config
            .and_then(|c| c.get_string("data", "prices"))
            .map(PathBuf::from)
            .ok_or_else(|| StratlabError::ConfigInvalid {
                section: "data".into(),
                key: "prices".into(),
                reason: "price CSV path is required (--prices or config)".into(),
            })?,
    };
    eprintln!("Loading prices from {}", path.display());

    let start = parse_range_bound(config, "start")?;
    let end = parse_range_bound(config, "end")?;
    CsvBarAdapter::new(path).fetch_bars(start, end)
}

fn parse_range_bound(
    config: Option<&dyn ConfigPort>,
    key: &str,
) -> Result<Option<NaiveDateTime>, StratlabError> {
    let Some(raw) = config.and_then(|c| c.get_string("data", key)) else {
        return Ok(None);
    };
    let raw = raw.trim().to_string();
    if let Ok(ts) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(Some(ts));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(Some(ts));
        }
    }
    Err(StratlabError::ConfigInvalid {
        section: "data".into(),
        key: key.into(),
        reason: "invalid date (expected YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)".into(),
    })
}

fn build_generator(
    config: Option<&dyn ConfigPort>,
    signals_override: Option<&PathBuf>,
    generator_override: Option<&str>,
    bars: &[PriceBar],
) -> Result<Box<dyn SignalGenerator>, StratlabError> {
    let signals_path = signals_override.cloned().or_else(|| {
        config
            .and_then(|c| c.get_string("data", "signals"))
            .map(PathBuf::from)
    });
    if let Some(path) = signals_path {
        eprintln!("Loading signals from {}", path.display());
        let raw = read_signal_column(&path)?;
        let signals = validate_raw_signals(&raw, bars)?;
        return Ok(Box::new(SignalTable::new(signals)));
    }

    let spec = generator_override
        .map(str::to_string)
        .or_else(|| config.and_then(|c| c.get_string("backtest", "generator")))
        .unwrap_or_else(|| "buy-hold".to_string());
    eprintln!("Using generator: {spec}");
    parse_generator(&spec)
}

/// Parse a generator spec: `buy-hold`, or `sma:SHORT,LONG`.
pub fn parse_generator(spec: &str) -> Result<Box<dyn SignalGenerator>, StratlabError> {
    let spec = spec.trim();
    if spec.eq_ignore_ascii_case("buy-hold") {
        return Ok(Box::new(BuyAndHold));
    }
    if let Some(params) = spec.strip_prefix("sma:") {
        let parts: Vec<&str> = params.split(',').map(str::trim).collect();
        if parts.len() == 2 {
            let short = parts[0].parse::<usize>().ok();
            let long = parts[1].parse::<usize>().ok();
            if let (Some(short), Some(long)) = (short, long) {
                return Ok(Box::new(SmaCrossover::new(short, long)?));
            }
        }
        return Err(StratlabError::SignalFailure {
            reason: format!("invalid sma spec {spec:?} (expected sma:SHORT,LONG)"),
        });
    }
    Err(StratlabError::SignalFailure {
        reason: format!("unknown generator {spec:?}"),
    })
}

fn build_engine_config(
    config: Option<&dyn ConfigPort>,
    permutations_override: Option<usize>,
    seed_override: Option<u64>,
) -> Result<EngineConfig, StratlabError> {
    let initial_capital = config
        .map(|c| c.get_double("backtest", "initial_capital", DEFAULT_INITIAL_CAPITAL))
        .unwrap_or(DEFAULT_INITIAL_CAPITAL);

    let timeframe = config
        .and_then(|c| c.get_string("backtest", "timeframe"))
        .unwrap_or_else(|| "hourly".to_string());
    let periods_per_year = match timeframe.to_lowercase().as_str() {
        "hourly" => PERIODS_PER_YEAR_HOURLY,
        "daily" => PERIODS_PER_YEAR_DAILY,
        other => {
            return Err(StratlabError::ConfigInvalid {
                section: "backtest".into(),
                key: "timeframe".into(),
                reason: format!("unknown timeframe {other:?} (expected hourly or daily)"),
            });
        }
    };

    let num_permutations = permutations_override.unwrap_or_else(|| {
        config
            .map(|c| {
                c.get_int(
                    "permutation",
                    "num_permutations",
                    DEFAULT_NUM_PERMUTATIONS as i64,
                ) as usize
            })
            .unwrap_or(DEFAULT_NUM_PERMUTATIONS)
    });
    let seed = seed_override.unwrap_or_else(|| {
        config
            .map(|c| c.get_int("permutation", "seed", DEFAULT_SEED as i64) as u64)
            .unwrap_or(DEFAULT_SEED)
    });

    let resampling_name = config
        .and_then(|c| c.get_string("permutation", "resampling"))
        .unwrap_or_else(|| "shuffle".to_string());
    let resampling = match resampling_name.to_lowercase().as_str() {
        "shuffle" => Resampling::Shuffle,
        "block" => {
            let mean_length = config
                .map(|c| c.get_int("permutation", "block_mean_length", 10))
                .unwrap_or(10);
            if mean_length < 1 {
                return Err(StratlabError::ConfigInvalid {
                    section: "permutation".into(),
                    key: "block_mean_length".into(),
                    reason: format!("must be at least 1, got {mean_length}"),
                });
            }
            Resampling::Block {
                mean_length: mean_length as usize,
            }
        }
        other => {
            return Err(StratlabError::ConfigInvalid {
                section: "permutation".into(),
                key: "resampling".into(),
                reason: format!("unknown resampling {other:?} (expected shuffle or block)"),
            });
        }
    };

    let parallel = config
        .map(|c| c.get_bool("permutation", "parallel", true))
        .unwrap_or(true);

    Ok(EngineConfig {
        initial_capital,
        periods_per_year,
        permutation: PermutationConfig {
            num_permutations,
            seed,
            resampling,
            parallel,
        },
    })
}
