//! Permutation significance test for strategy returns.
//!
//! Compares the realized strategy return against a null distribution built
//! by re-running the whole pipeline (signal generation → simulation →
//! total return) on randomized price paths. Each trial resamples the
//! close-to-close return sequence, reconstructs a synthetic path anchored
//! at the original first close, and re-invokes the signal generator on it.
//!
//! Trials are independent: each owns its own RNG (seeded from the master
//! seed and the trial index), its own synthetic path and its own position
//! state, so they can run on rayon worker threads without changing any
//! statistic — parallelism only affects latency.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use super::bar::{PriceBar, bar_returns};
use super::cancel::CancelToken;
use super::error::StratlabError;
use super::metrics::total_return_pct;
use super::signal::{SignalGenerator, generate_validated};
use super::simulator::run_simulation;

pub const DEFAULT_NUM_PERMUTATIONS: usize = 100;
pub const DEFAULT_SEED: u64 = 42;
/// Fixed one-sided significance threshold.
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// How a trial resamples the return sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resampling {
    /// Full random permutation of the returns. Destroys all temporal
    /// structure while preserving the return distribution exactly.
    Shuffle,
    /// Stationary block bootstrap with geometric block lengths. Preserves
    /// short-range autocorrelation; `mean_length` is the expected block
    /// length in bars.
    Block { mean_length: usize },
}

impl Default for Resampling {
    fn default() -> Self {
        Resampling::Shuffle
    }
}

#[derive(Debug, Clone)]
pub struct PermutationConfig {
    pub num_permutations: usize,
    pub seed: u64,
    pub resampling: Resampling,
    pub parallel: bool,
}

impl Default for PermutationConfig {
    fn default() -> Self {
        PermutationConfig {
            num_permutations: DEFAULT_NUM_PERMUTATIONS,
            seed: DEFAULT_SEED,
            resampling: Resampling::Shuffle,
            parallel: true,
        }
    }
}

/// Aggregate of the null distribution and the real result's rank in it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermutationSummary {
    pub original_return: f64,
    pub random_returns_mean: f64,
    pub random_returns_std: f64,
    pub p_value: f64,
    pub percentile: f64,
    pub num_permutations: usize,
    pub significant: bool,
}

/// Run the permutation test without progress reporting.
pub fn run_permutation_test(
    bars: &[PriceBar],
    generator: &dyn SignalGenerator,
    initial_capital: f64,
    config: &PermutationConfig,
    cancel: &CancelToken,
) -> Result<PermutationSummary, StratlabError> {
    run_permutation_test_with_progress(bars, generator, initial_capital, config, cancel, |_, _| {})
}

/// Run the permutation test, invoking `progress(completed, total)` after
/// each finished trial.
///
/// Any trial failure (generator error, malformed output) fails the whole
/// test: a partial null distribution would understate the noise floor and
/// bias the p-value.
pub fn run_permutation_test_with_progress<F>(
    bars: &[PriceBar],
    generator: &dyn SignalGenerator,
    initial_capital: f64,
    config: &PermutationConfig,
    cancel: &CancelToken,
    progress: F,
) -> Result<PermutationSummary, StratlabError>
where
    F: Fn(usize, usize) + Send + Sync,
{
    if config.num_permutations == 0 {
        return Err(StratlabError::ConfigInvalid {
            section: "permutation".into(),
            key: "num_permutations".into(),
            reason: "must be at least 1".into(),
        });
    }

    // Real pipeline once.
    let signals = generate_validated(generator, bars)?;
    let (equity_curve, _) = run_simulation(bars, &signals, initial_capital, cancel)?;
    let original_return = total_return_pct(&equity_curve);

    let returns = bar_returns(bars);
    let total = config.num_permutations;

    let run_trial = |trial: usize| -> Result<f64, StratlabError> {
        cancel.check()?;
        let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(trial as u64 + 1));
        let resampled = resample_returns(&returns, config.resampling, &mut rng);
        let synthetic = synthetic_bars(bars, &resampled);
        let trial_signals = generate_validated(generator, &synthetic)?;
        let (trial_curve, _) = run_simulation(&synthetic, &trial_signals, initial_capital, cancel)?;
        let result = total_return_pct(&trial_curve);
        progress(trial + 1, total);
        Ok(result)
    };

    let random_returns: Vec<f64> = if config.parallel {
        (0..total)
            .into_par_iter()
            .map(run_trial)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        (0..total)
            .map(run_trial)
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(summarize(original_return, &random_returns))
}

/// Fold the unordered trial sample into the reported statistics.
fn summarize(original_return: f64, random_returns: &[f64]) -> PermutationSummary {
    let n = random_returns.len() as f64;
    let mean = random_returns.iter().sum::<f64>() / n;
    let variance = random_returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;

    let beat_count = random_returns
        .iter()
        .filter(|&&r| r >= original_return)
        .count();
    let below_count = random_returns
        .iter()
        .filter(|&&r| r < original_return)
        .count();

    let p_value = beat_count as f64 / n;
    let percentile = below_count as f64 / n * 100.0;

    PermutationSummary {
        original_return,
        random_returns_mean: mean,
        random_returns_std: variance.sqrt(),
        p_value,
        percentile,
        num_permutations: random_returns.len(),
        significant: p_value < SIGNIFICANCE_LEVEL,
    }
}

fn resample_returns(returns: &[f64], resampling: Resampling, rng: &mut StdRng) -> Vec<f64> {
    match resampling {
        Resampling::Shuffle => {
            let mut resampled = returns.to_vec();
            resampled.shuffle(rng);
            resampled
        }
        Resampling::Block { mean_length } => resample_stationary_block(returns, rng, mean_length),
    }
}

/// Stationary block bootstrap: at each step, with probability
/// `1/mean_length` jump to a fresh random position, otherwise continue the
/// current block (wrapping at the end).
fn resample_stationary_block(returns: &[f64], rng: &mut StdRng, mean_length: usize) -> Vec<f64> {
    let n = returns.len();
    if n == 0 {
        return Vec::new();
    }
    let p = 1.0 / mean_length.max(1) as f64;
    let mut resampled = Vec::with_capacity(n);
    let mut pos = rng.gen_range(0..n);
    for _ in 0..n {
        resampled.push(returns[pos]);
        if rng.r#gen::<f64>() < p {
            pos = rng.gen_range(0..n);
        } else {
            pos = (pos + 1) % n;
        }
    }
    resampled
}

/// Rebuild a price path from resampled returns, anchored at the original
/// first close. Open/high/low scale with the synthetic/original close
/// ratio so each bar keeps its shape and stays positive; timestamps and
/// volume carry over unchanged.
fn synthetic_bars(bars: &[PriceBar], resampled_returns: &[f64]) -> Vec<PriceBar> {
    let mut out = Vec::with_capacity(bars.len());
    let mut close = match bars.first() {
        Some(bar) => bar.close,
        None => return out,
    };

    for (i, bar) in bars.iter().enumerate() {
        if i > 0 {
            close *= 1.0 + resampled_returns[i - 1];
        }
        let ratio = close / bar.close;
        out.push(PriceBar {
            timestamp: bar.timestamp,
            open: bar.open * ratio,
            high: bar.high * ratio,
            low: bar.low * ratio,
            close,
            volume: bar.volume,
        });
    }
    out
}
