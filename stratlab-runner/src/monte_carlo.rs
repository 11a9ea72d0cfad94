//! Monte Carlo trade resampling.
//!
//! Draws `num_iterations` synthetic trade sequences, each `num_samples` long,
//! by sampling the observed trades uniformly with replacement. The sequences
//! can then be run through the analytics reducer to see how sensitive the
//! equity curve is to trade ordering and luck.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use stratlab_core::analysis::analyze;
use stratlab_core::domain::Trade;
use stratlab_core::rng::SeedHierarchy;

/// Label under which the resampler derives its generator from `random_seed`.
pub const SEED_LABEL: &str = "monte-carlo";

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloOptions {
    /// Number of synthetic sequences.
    pub num_iterations: usize,
    /// Trades per sequence.
    pub num_samples: usize,
    pub random_seed: u64,
}

impl Default for MonteCarloOptions {
    fn default() -> Self {
        Self {
            num_iterations: 1000,
            num_samples: 100,
            random_seed: 0,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// 5th/50th/95th percentiles of one metric across samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentileBand {
    pub p5: f64,
    pub p50: f64,
    pub p95: f64,
}

impl PercentileBand {
    fn from_values(mut values: Vec<f64>) -> Self {
        values.sort_by(f64::total_cmp);
        Self {
            p5: percentile_sorted(&values, 5.0),
            p50: percentile_sorted(&values, 50.0),
            p95: percentile_sorted(&values, 95.0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub samples: usize,
    pub starting_capital: f64,
    pub final_capital: PercentileBand,
    pub profit_pct: PercentileBand,
    pub max_drawdown_pct: PercentileBand,
}

// ─── Sampling ────────────────────────────────────────────────────────

/// Resample `trades` with replacement. Empty input or zero counts give no samples.
pub fn monte_carlo(trades: &[Trade], options: &MonteCarloOptions) -> Vec<Vec<Trade>> {
    if trades.is_empty() || options.num_iterations == 0 || options.num_samples == 0 {
        return Vec::new();
    }

    let mut rng = SeedHierarchy::new(options.random_seed).rng_for(SEED_LABEL, 0);
    let samples: Vec<Vec<Trade>> = (0..options.num_iterations)
        .map(|_| {
            (0..options.num_samples)
                .map(|_| trades[rng.gen_range(0..trades.len())].clone())
                .collect()
        })
        .collect();

    debug!(
        source_trades = trades.len(),
        iterations = options.num_iterations,
        samples_per_iteration = options.num_samples,
        "monte carlo resampling complete"
    );
    samples
}

/// Analyze every sample and summarize the spread of outcomes.
pub fn summarize(samples: &[Vec<Trade>], starting_capital: f64) -> MonteCarloSummary {
    let reports: Vec<_> = samples
        .iter()
        .map(|sample| analyze(starting_capital, sample))
        .collect();

    MonteCarloSummary {
        samples: samples.len(),
        starting_capital,
        final_capital: PercentileBand::from_values(reports.iter().map(|r| r.final_capital).collect()),
        profit_pct: PercentileBand::from_values(reports.iter().map(|r| r.profit_pct).collect()),
        max_drawdown_pct: PercentileBand::from_values(
            reports.iter().map(|r| r.max_drawdown_pct).collect(),
        ),
    }
}

/// Linear-interpolated percentile of an ascending slice, `p` in [0, 100].
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = rank - lo as f64;
    // exact when both neighbours are equal; capped so rounding never passes `hi`
    (sorted[lo] + (sorted[hi] - sorted[lo]) * frac).min(sorted[hi])
}
