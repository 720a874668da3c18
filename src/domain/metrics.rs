//! Performance metrics derived from an equity curve and trade list.
//!
//! All computations are pure and deterministic; degenerate inputs (flat
//! series, zero completed trades) resolve to defined fallback values, never
//! errors. Return and drawdown figures are percentages; `win_rate` is a
//! fraction in [0, 1].

use serde::Serialize;

use super::simulator::{EquityPoint, Trade, TradeAction};

/// Annualization factor for daily bars.
pub const PERIODS_PER_YEAR_DAILY: f64 = 252.0;
/// Annualization factor for hourly bars (252 trading days × 24 hours,
/// matching round-the-clock markets).
pub const PERIODS_PER_YEAR_HOURLY: f64 = 252.0 * 24.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkMetrics {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub final_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub avg_trade_return: f64,
    pub final_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<BenchmarkMetrics>,
}

impl Metrics {
    /// Compute strategy metrics, and benchmark/alpha when a benchmark
    /// curve is supplied.
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        benchmark_curve: Option<&[EquityPoint]>,
        periods_per_year: f64,
    ) -> Self {
        let total_return = total_return_pct(equity_curve);
        let returns = simple_returns(equity_curve);
        let trip_returns = round_trip_returns(trades);

        let (win_rate, avg_trade_return) = if trip_returns.is_empty() {
            (0.0, 0.0)
        } else {
            let wins = trip_returns.iter().filter(|&&r| r > 0.0).count();
            let avg = trip_returns.iter().sum::<f64>() / trip_returns.len() as f64;
            (wins as f64 / trip_returns.len() as f64, avg)
        };

        let benchmark = benchmark_curve.map(|curve| BenchmarkMetrics {
            total_return: total_return_pct(curve),
            sharpe_ratio: annualized_sharpe(&simple_returns(curve), periods_per_year),
            max_drawdown: max_drawdown_pct(curve),
            final_value: curve.last().map(|p| p.value).unwrap_or(0.0),
        });
        let alpha = benchmark.as_ref().map(|b| total_return - b.total_return);

        Metrics {
            total_return,
            sharpe_ratio: annualized_sharpe(&returns, periods_per_year),
            max_drawdown: max_drawdown_pct(equity_curve),
            win_rate,
            avg_trade_return,
            final_value: equity_curve.last().map(|p| p.value).unwrap_or(0.0),
            alpha,
            benchmark,
        }
    }

    /// Rounded copy for reporting: two decimals on percent/value figures,
    /// three on the Sharpe ratio.
    pub fn rounded(&self) -> Self {
        Metrics {
            total_return: round2(self.total_return),
            sharpe_ratio: round3(self.sharpe_ratio),
            max_drawdown: round2(self.max_drawdown),
            win_rate: round2(self.win_rate),
            avg_trade_return: round2(self.avg_trade_return),
            final_value: round2(self.final_value),
            alpha: self.alpha.map(round2),
            benchmark: self.benchmark.as_ref().map(|b| BenchmarkMetrics {
                total_return: round2(b.total_return),
                sharpe_ratio: round3(b.sharpe_ratio),
                max_drawdown: round2(b.max_drawdown),
                final_value: round2(b.final_value),
            }),
        }
    }
}

/// `(last / first - 1) * 100`, zero for empty or degenerate curves.
pub fn total_return_pct(curve: &[EquityPoint]) -> f64 {
    match (curve.first(), curve.last()) {
        (Some(first), Some(last)) if first.value > 0.0 => (last.value / first.value - 1.0) * 100.0,
        _ => 0.0,
    }
}

/// Per-bar simple returns, defined from the second point onward.
fn simple_returns(curve: &[EquityPoint]) -> Vec<f64> {
    curve
        .windows(2)
        .map(|w| {
            if w[0].value > 0.0 {
                w[1].value / w[0].value - 1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// `mean(r) / stdev(r) * sqrt(periods_per_year)`; zero on a zero-variance
/// series rather than a division by zero.
fn annualized_sharpe(returns: &[f64], periods_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    if stddev > 0.0 {
        mean / stddev * periods_per_year.sqrt()
    } else {
        0.0
    }
}

/// Most negative drawdown from the running peak, as a percentage (≤ 0;
/// exactly 0 for a non-decreasing curve).
fn max_drawdown_pct(curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for point in curve {
        if point.value > peak {
            peak = point.value;
        }
        if peak > 0.0 {
            let dd = (point.value - peak) / peak * 100.0;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Percent return of each completed Buy→Sell round trip. A trailing open
/// Buy contributes nothing.
fn round_trip_returns(trades: &[Trade]) -> Vec<f64> {
    trades
        .chunks_exact(2)
        .filter(|pair| pair[0].action == TradeAction::Buy && pair[1].action == TradeAction::Sell)
        .map(|pair| (pair[1].price - pair[0].price) / pair[0].price * 100.0)
        .collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
