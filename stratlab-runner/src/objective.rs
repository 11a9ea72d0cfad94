//! Objective selector: named scalar objectives over a trade list.
//!
//! Every objective runs the trades through the analytics reducer with a
//! configured starting capital and extracts one field of the report.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use stratlab_core::analysis::{analyze, AnalysisReport};
use stratlab_core::domain::Trade;

use crate::optimize::SearchDirection;

/// Which report field to optimize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Objective {
    #[default]
    ProfitPct,
    FinalCapital,
    Expectancy,
    SystemQuality,
    ProfitFactor,
    ReturnOnAccount,
    ExpectedValue,
    /// ≤ 0, so maximising it means minimising the drawdown.
    MaxDrawdownPct,
    TradeCount,
}

impl Objective {
    pub const ALL: [Objective; 9] = [
        Objective::ProfitPct,
        Objective::FinalCapital,
        Objective::Expectancy,
        Objective::SystemQuality,
        Objective::ProfitFactor,
        Objective::ReturnOnAccount,
        Objective::ExpectedValue,
        Objective::MaxDrawdownPct,
        Objective::TradeCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProfitPct => "profit-pct",
            Self::FinalCapital => "final-capital",
            Self::Expectancy => "expectancy",
            Self::SystemQuality => "system-quality",
            Self::ProfitFactor => "profit-factor",
            Self::ReturnOnAccount => "return-on-account",
            Self::ExpectedValue => "expected-value",
            Self::MaxDrawdownPct => "max-drawdown-pct",
            Self::TradeCount => "trade-count",
        }
    }

    /// Extract the objective's value from a report.
    pub fn extract(&self, report: &AnalysisReport) -> f64 {
        match self {
            Self::ProfitPct => report.profit_pct,
            Self::FinalCapital => report.final_capital,
            Self::Expectancy => report.expectancy,
            Self::SystemQuality => report.system_quality,
            Self::ProfitFactor => report.profit_factor,
            Self::ReturnOnAccount => report.return_on_account,
            Self::ExpectedValue => report.expected_value,
            Self::MaxDrawdownPct => report.max_drawdown_pct,
            Self::TradeCount => report.total_trades as f64,
        }
    }

    pub fn evaluate(&self, starting_capital: f64, trades: &[Trade]) -> f64 {
        self.extract(&analyze(starting_capital, trades))
    }

    /// Direction in which this objective improves.
    ///
    /// Every objective is "higher is better"; drawdown qualifies because it
    /// is reported as a non-positive number.
    pub fn search_direction(&self) -> SearchDirection {
        SearchDirection::Max
    }

    /// The objective as a plain trade-list function, ready for the optimizer.
    pub fn into_fn(self, starting_capital: f64) -> impl Fn(&[Trade]) -> f64 + Send + Sync {
        move |trades| self.evaluate(starting_capital, trades)
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised objective name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown objective '{0}'")]
pub struct UnknownObjective(pub String);

impl FromStr for Objective {
    type Err = UnknownObjective;

    /// Accepts kebab-case or snake_case names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|o| o.as_str() == wanted)
            .ok_or_else(|| UnknownObjective(s.to_string()))
    }
}
