//! Position simulation: signals in, equity curve and trade list out.
//!
//! A single all-in long-only position per run. The state machine is
//! edge-triggered: a Buy only acts from Flat, a Sell only from Long, and
//! everything else is a hold. Mark-to-market happens on every bar before
//! the signal is evaluated, so the equity curve always has exactly one
//! point per bar.

use chrono::NaiveDateTime;

use super::bar::PriceBar;
use super::cancel::CancelToken;
use super::error::StratlabError;
use super::signal::Signal;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
}

/// One realized position transition, immutable once emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub timestamp: NaiveDateTime,
    pub action: TradeAction,
    pub price: f64,
    pub shares: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// Exclusive per-run position state. Created at the start of a simulation,
/// threaded through every bar, discarded at the end — never shared across
/// runs or permutation trials.
#[derive(Debug)]
struct Simulation {
    state: PositionState,
    cash: f64,
    shares: f64,
}

impl Simulation {
    fn new(initial_capital: f64) -> Self {
        Simulation {
            state: PositionState::Flat,
            cash: initial_capital,
            shares: 0.0,
        }
    }

    fn mark_to_market(&self, close: f64) -> f64 {
        match self.state {
            PositionState::Flat => self.cash,
            PositionState::Long => self.shares * close,
        }
    }
}

/// Run the position state machine over an aligned price/signal sequence.
///
/// Fractional shares are allowed; an open position at the last bar is left
/// open, its valuation already reflected in the final equity point.
/// Signals and bars must be the same length; a mismatch is refused rather
/// than silently truncating the equity curve.
pub fn run_simulation(
    bars: &[PriceBar],
    signals: &[Signal],
    initial_capital: f64,
    cancel: &CancelToken,
) -> Result<(Vec<EquityPoint>, Vec<Trade>), StratlabError> {
    if signals.len() != bars.len() {
        return Err(StratlabError::SignalLengthMismatch {
            expected: bars.len(),
            actual: signals.len(),
        });
    }

    let mut sim = Simulation::new(initial_capital);
    let mut equity_curve = Vec::with_capacity(bars.len());
    let mut trades = Vec::new();

    for (bar, &signal) in bars.iter().zip(signals) {
        cancel.check()?;

        // Mark-to-market before the signal so the curve has one point per
        // bar regardless of trade activity.
        equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            value: sim.mark_to_market(bar.close),
        });

        match (sim.state, signal) {
            (PositionState::Flat, Signal::Buy) => {
                sim.shares = sim.cash / bar.close;
                sim.cash = 0.0;
                sim.state = PositionState::Long;
                trades.push(Trade {
                    timestamp: bar.timestamp,
                    action: TradeAction::Buy,
                    price: bar.close,
                    shares: sim.shares,
                });
            }
            (PositionState::Long, Signal::Sell) => {
                let shares_sold = sim.shares;
                sim.cash = sim.shares * bar.close;
                sim.shares = 0.0;
                sim.state = PositionState::Flat;
                trades.push(Trade {
                    timestamp: bar.timestamp,
                    action: TradeAction::Sell,
                    price: bar.close,
                    shares: shares_sold,
                });
            }
            _ => {} // hold
        }
    }

    Ok((equity_curve, trades))
}

/// Buy-and-hold benchmark: the same state machine fed a single Buy at the
/// first bar and holds through the last.
pub fn buy_and_hold(
    bars: &[PriceBar],
    initial_capital: f64,
    cancel: &CancelToken,
) -> Result<Vec<EquityPoint>, StratlabError> {
    let mut signals = vec![Signal::Hold; bars.len()];
    if let Some(first) = signals.first_mut() {
        *first = Signal::Buy;
    }
    let (curve, _) = run_simulation(bars, &signals, initial_capital, cancel)?;
    Ok(curve)
}
