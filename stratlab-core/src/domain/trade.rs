//! Trade: a completed round trip, produced exactly once per closed position.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::{TimestampedValue, TradeDirection};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitReason {
    StopLoss,
    ProfitTarget,
    ExitRule,
    /// Still open after the last bar; closed at the last close.
    Finalize,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop-loss",
            ExitReason::ProfitTarget => "profit-target",
            ExitReason::ExitRule => "exit-rule",
            ExitReason::Finalize => "finalize",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A closed trade.
///
/// `profit` is per unit and direction-adjusted; `growth` is `exit/entry` for
/// longs and `entry/exit` for shorts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub direction: TradeDirection,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    pub exit_time: NaiveDateTime,
    pub exit_price: f64,
    pub profit: f64,
    pub profit_pct: f64,
    pub growth: f64,
    /// Risk at entry as a percentage of the entry price, if a stop was set.
    pub risk_pct: Option<f64>,
    /// Profit divided by the initial unit risk; 0 when no risk was established.
    pub r_multiple: f64,
    pub holding_period: usize,
    pub exit_reason: ExitReason,
    /// Initial stop price, if a stop was set.
    pub stop_price: Option<f64>,
    pub stop_price_series: Option<Vec<TimestampedValue>>,
    pub risk_series: Option<Vec<TimestampedValue>>,
    pub profit_target: Option<f64>,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.profit > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.profit < 0.0
    }
}
