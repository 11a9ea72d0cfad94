//! TOML run configuration.
//!
//! ```toml
//! [backtest]
//! data = "bars.csv"
//! starting_capital = 10000.0
//!
//! [strategy]
//! preset = "breakout"
//! parameters = { entry_window = 20, stop_pct = 2.0 }
//!
//! [optimize]
//! objective = "profit-pct"
//! optimization_type = "hill-climb"
//!
//! [[optimize.parameters]]
//! name = "entry_window"
//! start = 10
//! end = 40
//! step = 5
//! ```
//!
//! Every section and field is optional; missing ones take their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratlab_core::domain::parameter::validate_defs;
use stratlab_core::domain::{ParameterDef, ParameterError, Parameters};
use stratlab_core::engine::BacktestOptions;
use stratlab_core::strategy::Strategy;

use crate::monte_carlo::MonteCarloOptions;
use crate::objective::Objective;
use crate::optimize::{OptimizationType, OptimizeOptions, SearchDirection};
use crate::presets::{preset, UnknownPreset};

/// Unique identifier for a run configuration (content hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    UnknownPreset(#[from] UnknownPreset),

    #[error("invalid parameter definition: {0}")]
    InvalidParameter(#[from] ParameterError),

    #[error("starting capital must be positive and finite, got {0}")]
    InvalidCapital(f64),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ─── Sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub backtest: BacktestSection,
    pub strategy: StrategySection,
    pub optimize: OptimizeSection,
    pub walk_forward: WalkForwardSection,
    pub monte_carlo: MonteCarloOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    /// CSV bar file. Relative paths resolve against the working directory.
    pub data: Option<PathBuf>,
    pub starting_capital: f64,
    pub record_stop_price: bool,
    pub record_risk: bool,
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            data: None,
            starting_capital: 10_000.0,
            record_stop_price: false,
            record_risk: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySection {
    pub preset: String,
    pub parameters: Parameters,
}

impl Default for StrategySection {
    fn default() -> Self {
        Self {
            preset: "breakout".into(),
            parameters: Parameters::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeSection {
    pub objective: Objective,
    /// Overrides the objective's natural direction.
    pub search_direction: Option<SearchDirection>,
    pub optimization_type: OptimizationType,
    pub num_starting_points: usize,
    pub random_seed: u64,
    pub record_all_results: bool,
    pub record_duration: bool,
    pub parallel: bool,
    pub parameters: Vec<ParameterDef>,
}

impl Default for OptimizeSection {
    fn default() -> Self {
        let defaults = OptimizeOptions::default();
        Self {
            objective: Objective::default(),
            search_direction: None,
            optimization_type: defaults.optimization_type,
            num_starting_points: defaults.num_starting_points,
            random_seed: defaults.random_seed,
            record_all_results: defaults.record_all_results,
            record_duration: defaults.record_duration,
            parallel: defaults.parallel,
            parameters: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkForwardSection {
    pub in_sample_size: usize,
    pub out_sample_size: usize,
}

impl Default for WalkForwardSection {
    fn default() -> Self {
        Self {
            in_sample_size: 252,
            out_sample_size: 63,
        }
    }
}

// ─── Loading and derived settings ────────────────────────────────────

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let capital = self.backtest.starting_capital;
        if !capital.is_finite() || capital <= 0.0 {
            return Err(ConfigError::InvalidCapital(capital));
        }
        validate_defs(&self.optimize.parameters)?;
        Ok(())
    }

    /// Deterministic hash of the configuration, stable across runs.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    pub fn backtest_options(&self) -> BacktestOptions {
        BacktestOptions {
            record_stop_price: self.backtest.record_stop_price,
            record_risk: self.backtest.record_risk,
        }
    }

    /// The configured preset with the strategy section's parameters.
    /// Optimizer ranges are not applied here; the search supplies them.
    pub fn build_strategy(&self) -> Result<Strategy, ConfigError> {
        Ok(preset(&self.strategy.preset, &self.strategy.parameters)?)
    }

    pub fn optimize_options(&self) -> OptimizeOptions {
        let section = &self.optimize;
        OptimizeOptions {
            search_direction: section
                .search_direction
                .unwrap_or_else(|| section.objective.search_direction()),
            optimization_type: section.optimization_type,
            num_starting_points: section.num_starting_points,
            random_seed: section.random_seed,
            record_all_results: section.record_all_results,
            record_duration: section.record_duration,
            backtest: self.backtest_options(),
            parallel: section.parallel,
        }
    }

    pub fn objective_fn(&self) -> impl Fn(&[stratlab_core::domain::Trade]) -> f64 + Send + Sync {
        self.optimize.objective.into_fn(self.backtest.starting_capital)
    }
}
