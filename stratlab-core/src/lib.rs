//! StratLab Core: domain types, strategy contract, position lifecycle engine, analytics.
//!
//! This crate contains the simulation kernel:
//! - Domain types (bars, positions, trades, parameter definitions)
//! - Strategy contract with explicit entry/exit decisions
//! - Bar-by-bar position lifecycle state machine with stop ratchet
//! - Single-pass performance analytics and retracement reconstruction
//! - Deterministic seed hierarchy for everything stochastic downstream
//!
//! Nothing here performs I/O or reads a global random source.

pub mod analysis;
pub mod domain;
pub mod engine;
pub mod rng;
pub mod strategy;

pub use analysis::{analyze, max_retracement, AnalysisReport};
pub use domain::{
    Bar, ExitReason, ParameterDef, ParameterError, Parameters, Position, TimestampedValue, Trade,
    TradeDirection,
};
pub use engine::{backtest, BacktestOptions, BacktestOutcome, PositionStatus};
pub use rng::SeedHierarchy;
pub use strategy::{Decision, EntryContext, PositionContext, Strategy};
