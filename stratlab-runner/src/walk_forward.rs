//! Walk-forward driver: sliding in-sample optimization with out-of-sample replay.
//!
//! The bar series is cut into consecutive windows of `in_sample_size` bars
//! followed by `out_sample_size` bars. Each iteration optimizes on the
//! in-sample slice, applies the winning parameters to the out-of-sample slice
//! and appends the resulting trades. The window start then advances by
//! `out_sample_size`, so out-of-sample slices tile the series without overlap.
//!
//! Every iteration gets its own optimizer seed derived from the master seed,
//! so one window's hill-climb draws never depend on another's.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use stratlab_core::domain::{Bar, ParameterDef, Parameters, Trade};
use stratlab_core::engine::backtest;
use stratlab_core::rng::SeedHierarchy;
use stratlab_core::strategy::Strategy;

use crate::optimize::{optimize, OptimizeError, OptimizeOptions};

/// Label used to derive per-iteration optimizer seeds.
pub const SEED_LABEL: &str = "walk-forward";

// ─── Result types ────────────────────────────────────────────────────

/// One in-sample/out-of-sample iteration. Bar indices are half-open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub iteration: usize,
    pub in_sample_start: usize,
    pub in_sample_end: usize,
    pub out_sample_start: usize,
    pub out_sample_end: usize,
    pub best_parameters: Parameters,
    /// Objective of the best parameters on the in-sample slice.
    pub in_sample_objective: f64,
    pub out_sample_trades: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardResult {
    /// Out-of-sample trades of every window, in chronological order.
    pub trades: Vec<Trade>,
    pub windows: Vec<WindowResult>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalkForwardError {
    #[error("window sizes must be positive (in-sample {in_sample}, out-of-sample {out_sample})")]
    InvalidWindow { in_sample: usize, out_sample: usize },
    #[error(transparent)]
    Optimize(#[from] OptimizeError),
}

// ─── Window layout ───────────────────────────────────────────────────

/// `(in_start, in_end, out_end)` for every complete window over `len` bars.
pub fn window_bounds(len: usize, in_sample_size: usize, out_sample_size: usize) -> Vec<(usize, usize, usize)> {
    if in_sample_size == 0 || out_sample_size == 0 {
        return Vec::new();
    }
    let mut bounds = Vec::new();
    let mut start = 0;
    while start + in_sample_size + out_sample_size <= len {
        let in_end = start + in_sample_size;
        bounds.push((start, in_end, in_end + out_sample_size));
        start += out_sample_size;
    }
    bounds
}

// ─── Driver ──────────────────────────────────────────────────────────

pub fn walk_forward<F>(
    strategy: &Strategy,
    parameter_defs: &[ParameterDef],
    objective: F,
    bars: &[Bar],
    in_sample_size: usize,
    out_sample_size: usize,
    options: &OptimizeOptions,
) -> Result<WalkForwardResult, WalkForwardError>
where
    F: Fn(&[Trade]) -> f64 + Sync,
{
    if in_sample_size == 0 || out_sample_size == 0 {
        return Err(WalkForwardError::InvalidWindow {
            in_sample: in_sample_size,
            out_sample: out_sample_size,
        });
    }

    let seeds = SeedHierarchy::new(options.random_seed);
    let mut result = WalkForwardResult::default();

    for (iteration, (in_start, in_end, out_end)) in
        window_bounds(bars.len(), in_sample_size, out_sample_size)
            .into_iter()
            .enumerate()
    {
        let window_options = OptimizeOptions {
            random_seed: seeds.sub_seed(SEED_LABEL, iteration as u64),
            ..options.clone()
        };
        let optimized = optimize(
            strategy,
            parameter_defs,
            &objective,
            &bars[in_start..in_end],
            &window_options,
        )?;

        let tuned = strategy.with_overrides(&optimized.best_parameters);
        let outcome = backtest(&tuned, &bars[in_end..out_end], &options.backtest);
        debug!(
            iteration,
            in_start,
            in_end,
            out_end,
            in_sample_objective = optimized.best_value,
            out_sample_trades = outcome.trades.len(),
            "walk-forward window"
        );

        result.windows.push(WindowResult {
            iteration,
            in_sample_start: in_start,
            in_sample_end: in_end,
            out_sample_start: in_end,
            out_sample_end: out_end,
            best_parameters: optimized.best_parameters,
            in_sample_objective: optimized.best_value,
            out_sample_trades: outcome.trades.len(),
        });
        result.trades.extend(outcome.trades);
    }

    info!(
        strategy = %strategy.name,
        windows = result.windows.len(),
        trades = result.trades.len(),
        "walk-forward complete"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_tile_out_of_sample() {
        assert_eq!(
            window_bounds(10, 4, 2),
            vec![(0, 4, 6), (2, 6, 8), (4, 8, 10)]
        );
    }

    #[test]
    fn incomplete_last_window_dropped() {
        assert_eq!(window_bounds(9, 4, 2), vec![(0, 4, 6), (2, 6, 8)]);
        assert!(window_bounds(5, 4, 2).is_empty());
    }

    #[test]
    fn zero_sizes_have_no_windows() {
        assert!(window_bounds(100, 0, 5).is_empty());
        assert!(window_bounds(100, 5, 0).is_empty());
    }

    #[test]
    fn zero_window_rejected() {
        let strategy = Strategy::new("flat", |_| stratlab_core::strategy::Decision::NoAction);
        let err = walk_forward(
            &strategy,
            &[],
            |t: &[Trade]| t.len() as f64,
            &[],
            0,
            5,
            &OptimizeOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            WalkForwardError::InvalidWindow {
                in_sample: 0,
                out_sample: 5
            }
        );
    }
}
