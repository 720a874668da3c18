//! Result assembly: packaging curves, trades and statistics into the
//! response contract.
//!
//! The report is the only shape that crosses the engine boundary. On
//! success it carries rounded metrics, charting-sized curves and a
//! truncated trade list; on failure it carries a structured error and
//! nothing else — never a partial curve or metric.

use serde::Serialize;

use super::error::StratlabError;
use super::metrics::Metrics;
use super::permutation::PermutationSummary;
use super::simulator::{EquityPoint, Trade, TradeAction};

/// Curves are thinned to roughly this many points for charting.
pub const MAX_CURVE_POINTS: usize = 500;
/// Trade list cap in backtest mode.
pub const MAX_TRADES_BACKTEST: usize = 50;
/// Trade list cap in permutation mode (the null distribution is the
/// payload there, not the trade tape).
pub const MAX_TRADES_PERMUTATION: usize = 10;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Backtest,
    Permutation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurvePoint {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub date: String,
    pub action: &'static str,
    pub price: f64,
    pub shares: f64,
}

/// Success envelope.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub success: bool,
    pub test_type: TestType,
    pub metrics: Metrics,
    pub equity_curve: Vec<CurvePoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark_curve: Option<Vec<CurvePoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permutation_test: Option<PermutationSummary>,
    pub trades: Vec<TradeRecord>,
    pub total_trades: usize,
}

/// Failure envelope.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl BacktestReport {
    pub fn assemble(
        test_type: TestType,
        metrics: &Metrics,
        equity_curve: &[EquityPoint],
        benchmark_curve: Option<&[EquityPoint]>,
        trades: &[Trade],
        permutation_test: Option<PermutationSummary>,
    ) -> Self {
        let trade_cap = match test_type {
            TestType::Backtest => MAX_TRADES_BACKTEST,
            TestType::Permutation => MAX_TRADES_PERMUTATION,
        };

        BacktestReport {
            success: true,
            test_type,
            metrics: metrics.rounded(),
            equity_curve: downsample_curve(equity_curve),
            benchmark_curve: benchmark_curve.map(downsample_curve),
            permutation_test: permutation_test.map(round_summary),
            trades: trades.iter().take(trade_cap).map(trade_record).collect(),
            total_trades: trades.len(),
        }
    }

    pub fn to_json(&self) -> Result<String, StratlabError> {
        serde_json::to_string(self).map_err(|e| StratlabError::DataLoad {
            reason: format!("report serialization failed: {e}"),
        })
    }
}

impl From<&StratlabError> for FailureReport {
    fn from(err: &StratlabError) -> Self {
        FailureReport {
            success: false,
            error: err.to_string(),
            details: Some(format!("{err:?}")),
        }
    }
}

impl FailureReport {
    pub fn to_json(&self) -> String {
        // The failure envelope has no unserializable fields; fall back to
        // a hand-built object rather than erroring inside error handling.
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!("{{\"success\":false,\"error\":{:?}}}", self.error)
        })
    }
}

/// Thin a curve to at most ~[`MAX_CURVE_POINTS`] evenly strided points.
fn downsample_curve(curve: &[EquityPoint]) -> Vec<CurvePoint> {
    let step = (curve.len() / MAX_CURVE_POINTS).max(1);
    curve
        .iter()
        .step_by(step)
        .map(|point| CurvePoint {
            date: point.timestamp.format(DATE_FORMAT).to_string(),
            value: round2(point.value),
        })
        .collect()
}

fn trade_record(trade: &Trade) -> TradeRecord {
    TradeRecord {
        date: trade.timestamp.format(DATE_FORMAT).to_string(),
        action: match trade.action {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
        },
        price: trade.price,
        shares: trade.shares,
    }
}

fn round_summary(summary: PermutationSummary) -> PermutationSummary {
    PermutationSummary {
        original_return: round2(summary.original_return),
        random_returns_mean: round2(summary.random_returns_mean),
        random_returns_std: round2(summary.random_returns_std),
        p_value: round_to(summary.p_value, 4),
        percentile: round_to(summary.percentile, 1),
        ..summary
    }
}

fn round2(v: f64) -> f64 {
    round_to(v, 2)
}

fn round_to(v: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (v * factor).round() / factor
}
