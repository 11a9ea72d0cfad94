//! StratLab Runner: parameter search and the collaborators that feed the core.
//!
//! This crate builds on `stratlab-core` to provide:
//! - Grid and hill-climbing parameter optimization
//! - Named objectives over the analytics report
//! - Walk-forward re-optimization and Monte Carlo trade resampling
//! - TOML run configuration, CSV bar loading and a preset strategy catalog
//! - JSON, CSV and Markdown export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod monte_carlo;
pub mod objective;
pub mod optimize;
pub mod presets;
pub mod walk_forward;

pub use config::{ConfigError, RunConfig, RunId};
pub use data_loader::{load_bars_csv, read_bars, LoadError};
pub use monte_carlo::{monte_carlo, summarize, MonteCarloOptions, MonteCarloSummary, PercentileBand};
pub use objective::{Objective, UnknownObjective};
pub use optimize::{
    grid_coordinates, optimize, IterationResult, OptimizationResult, OptimizationType,
    OptimizeError, OptimizeOptions, SearchDirection,
};
pub use presets::{preset, UnknownPreset, PRESET_NAMES};
pub use walk_forward::{walk_forward, WalkForwardError, WalkForwardResult, WindowResult};
