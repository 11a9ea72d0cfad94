//! Parameter optimizer: exhaustive grid search and hill-climbing with random restarts.
//!
//! Both searches work on integer grid indices: coordinate `i` of a
//! [`ParameterDef`] is `start + i * step`. Each coordinate is evaluated by
//! cloning the strategy with the coordinate's parameters merged in, running a
//! backtest and applying the caller's objective to the resulting trades.
//!
//! Grid evaluation can fan out over rayon. Results are collected in
//! enumeration order and reduced sequentially, so the parallel and
//! sequential searches agree exactly.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use stratlab_core::domain::{Bar, ParameterDef, ParameterError, Parameters, Trade};
use stratlab_core::domain::parameter::validate_defs;
use stratlab_core::engine::{backtest, BacktestOptions};
use stratlab_core::strategy::Strategy;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchDirection {
    #[default]
    Max,
    Min,
}

impl SearchDirection {
    /// Strictly better; ties are not an improvement.
    pub fn is_better(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Max => candidate > incumbent,
            Self::Min => candidate < incumbent,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizationType {
    #[default]
    Grid,
    HillClimb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    pub search_direction: SearchDirection,
    pub optimization_type: OptimizationType,
    /// Hill-climb restarts.
    pub num_starting_points: usize,
    /// Seed for hill-climb restart points.
    pub random_seed: u64,
    /// Keep every evaluated coordinate in the result.
    pub record_all_results: bool,
    pub record_duration: bool,
    pub backtest: BacktestOptions,
    /// Evaluate grid coordinates on the rayon pool.
    pub parallel: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            search_direction: SearchDirection::Max,
            optimization_type: OptimizationType::Grid,
            num_starting_points: 4,
            random_seed: 0,
            record_all_results: false,
            record_duration: false,
            backtest: BacktestOptions::default(),
            parallel: false,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// One evaluated coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationResult {
    pub parameters: Parameters,
    pub objective: f64,
    pub num_trades: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub best_value: f64,
    /// Strategy defaults with the best coordinate merged in.
    pub best_parameters: Parameters,
    pub all_results: Option<Vec<IterationResult>>,
    pub duration: Option<Duration>,
    /// Number of backtests actually run.
    pub evaluations: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error("invalid parameter definition: {0}")]
    InvalidParameter(#[from] ParameterError),
    #[error("cannot optimize over an empty bar series")]
    EmptyBars,
}

// ─── Entry point ─────────────────────────────────────────────────────

/// Search `parameter_defs` for the coordinate that optimizes `objective`.
///
/// With no parameter definitions there is nothing to search and the result
/// carries a zero objective with the strategy's own parameters.
pub fn optimize<F>(
    strategy: &Strategy,
    parameter_defs: &[ParameterDef],
    objective: F,
    bars: &[Bar],
    options: &OptimizeOptions,
) -> Result<OptimizationResult, OptimizeError>
where
    F: Fn(&[Trade]) -> f64 + Sync,
{
    if bars.is_empty() {
        return Err(OptimizeError::EmptyBars);
    }
    validate_defs(parameter_defs)?;

    let started = Instant::now();
    let evaluator = Evaluator {
        strategy,
        defs: parameter_defs,
        objective: &objective,
        bars,
        backtest: &options.backtest,
    };

    let search = if parameter_defs.is_empty() {
        Search {
            best: None,
            samples: Vec::new(),
            evaluations: 0,
        }
    } else {
        match options.optimization_type {
            OptimizationType::Grid => grid_search(&evaluator, options),
            OptimizationType::HillClimb => hill_climb(&evaluator, options),
        }
    };

    let (best_value, best_parameters) = match search.best {
        Some(best) => (best.objective, strategy.with_overrides(&best.parameters).parameters),
        None => (0.0, strategy.parameters.clone()),
    };

    info!(
        strategy = %strategy.name,
        kind = ?options.optimization_type,
        evaluations = search.evaluations,
        best_value,
        ?best_parameters,
        "optimization complete"
    );

    Ok(OptimizationResult {
        best_value,
        best_parameters,
        all_results: options.record_all_results.then_some(search.samples),
        duration: options.record_duration.then(|| started.elapsed()),
        evaluations: search.evaluations,
    })
}

// ─── Evaluation ──────────────────────────────────────────────────────

struct Evaluator<'a, F> {
    strategy: &'a Strategy,
    defs: &'a [ParameterDef],
    objective: &'a F,
    bars: &'a [Bar],
    backtest: &'a BacktestOptions,
}

impl<F> Evaluator<'_, F>
where
    F: Fn(&[Trade]) -> f64 + Sync,
{
    fn parameters_at(&self, coordinate: &[usize]) -> Parameters {
        self.defs
            .iter()
            .zip(coordinate)
            .map(|(def, &i)| (def.name.clone(), def.value_at(i)))
            .collect()
    }

    fn evaluate(&self, coordinate: &[usize]) -> IterationResult {
        let parameters = self.parameters_at(coordinate);
        let tuned = self.strategy.with_overrides(&parameters);
        let outcome = backtest(&tuned, self.bars, self.backtest);
        let objective = (self.objective)(&outcome.trades);
        debug!(?parameters, objective, trades = outcome.trades.len(), "evaluated coordinate");
        IterationResult {
            parameters,
            objective,
            num_trades: outcome.trades.len(),
        }
    }
}

struct Search {
    best: Option<IterationResult>,
    samples: Vec<IterationResult>,
    evaluations: usize,
}

// ─── Grid search ─────────────────────────────────────────────────────

/// Every coordinate of the lattice, first parameter outermost.
pub fn grid_coordinates(defs: &[ParameterDef]) -> Vec<Vec<usize>> {
    let mut coordinates = vec![Vec::with_capacity(defs.len())];
    for def in defs {
        let steps = def.num_steps();
        coordinates = coordinates
            .into_iter()
            .flat_map(|prefix| {
                (0..steps).map(move |i| {
                    let mut next = prefix.clone();
                    next.push(i);
                    next
                })
            })
            .collect();
    }
    coordinates
}

fn grid_search<F>(evaluator: &Evaluator<'_, F>, options: &OptimizeOptions) -> Search
where
    F: Fn(&[Trade]) -> f64 + Sync,
{
    let coordinates = grid_coordinates(evaluator.defs);
    debug!(coordinates = coordinates.len(), parallel = options.parallel, "grid search");

    let results: Vec<IterationResult> = if options.parallel {
        coordinates.par_iter().map(|c| evaluator.evaluate(c)).collect()
    } else {
        coordinates.iter().map(|c| evaluator.evaluate(c)).collect()
    };

    let evaluations = results.len();
    let mut best: Option<IterationResult> = None;
    let mut samples = Vec::new();
    for result in results {
        let improves = best
            .as_ref()
            .map_or(true, |b| options.search_direction.is_better(result.objective, b.objective));
        if improves {
            best = Some(result.clone());
        }
        if options.record_all_results {
            samples.push(result);
        }
    }

    Search {
        best,
        samples,
        evaluations,
    }
}

// ─── Hill climbing ───────────────────────────────────────────────────

/// Axis-aligned neighbour one step forward or backward along `dim`, if in range.
fn neighbour(coordinate: &[usize], dim: usize, forward: bool, max_index: usize) -> Option<Vec<usize>> {
    let current = coordinate[dim];
    let next = if forward {
        (current < max_index).then(|| current + 1)?
    } else {
        current.checked_sub(1)?
    };
    let mut moved = coordinate.to_vec();
    moved[dim] = next;
    Some(moved)
}

fn hill_climb<F>(evaluator: &Evaluator<'_, F>, options: &OptimizeOptions) -> Search
where
    F: Fn(&[Trade]) -> f64 + Sync,
{
    let direction = options.search_direction;
    let max_indices: Vec<usize> = evaluator.defs.iter().map(|d| d.max_index()).collect();
    let mut rng = StdRng::seed_from_u64(options.random_seed);
    // coordinate -> (objective, trade count)
    let mut memo: HashMap<Vec<usize>, (f64, usize)> = HashMap::new();
    let mut samples = Vec::new();
    let mut best: Option<(Vec<usize>, f64)> = None;

    let mut value_of = |coordinate: &Vec<usize>, samples: &mut Vec<IterationResult>| -> f64 {
        if let Some(&(cached, _)) = memo.get(coordinate) {
            return cached;
        }
        let result = evaluator.evaluate(coordinate);
        let value = result.objective;
        memo.insert(coordinate.clone(), (value, result.num_trades));
        if options.record_all_results {
            samples.push(result);
        }
        value
    };

    for restart in 0..options.num_starting_points {
        let mut current: Vec<usize> = max_indices.iter().map(|&m| rng.gen_range(0..=m)).collect();
        let mut current_value = value_of(&current, &mut samples);

        loop {
            let mut moved = false;
            'dims: for (dim, &max_index) in max_indices.iter().enumerate() {
                for forward in [true, false] {
                    let Some(candidate) = neighbour(&current, dim, forward, max_index) else {
                        continue;
                    };
                    let value = value_of(&candidate, &mut samples);
                    if direction.is_better(value, current_value) {
                        current = candidate;
                        current_value = value;
                        moved = true;
                        break 'dims;
                    }
                }
            }
            if !moved {
                break;
            }
        }

        debug!(restart, coordinate = ?current, value = current_value, "hill-climb restart converged");
        let improves = best
            .as_ref()
            .map_or(true, |(_, b)| direction.is_better(current_value, *b));
        if improves {
            best = Some((current, current_value));
        }
    }

    let evaluations = memo.len();
    let best = best.map(|(coordinate, objective)| IterationResult {
        parameters: evaluator.parameters_at(&coordinate),
        objective,
        num_trades: memo.get(&coordinate).map_or(0, |&(_, trades)| trades),
    });

    Search {
        best,
        samples,
        evaluations,
    }
}
