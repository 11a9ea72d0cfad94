//! Performance analytics over closed trades.

pub mod report;
pub mod retracement;

pub use report::{analyze, AnalysisReport};
pub use retracement::max_retracement;
