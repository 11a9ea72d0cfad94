//! Backtesting engine: bar-by-bar position lifecycle and its risk bookkeeping.
//!
//! The engine consumes bars that already carry their named indicator values
//! and a [`Strategy`](crate::strategy::Strategy), and emits closed trades.

pub mod backtest;
pub mod lookback;
pub mod risk;

pub use backtest::{backtest, BacktestOptions, BacktestOutcome, PositionStatus};
pub use lookback::RingBuffer;
pub use risk::StopRatchet;
