//! Open position tracking.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::trade::{ExitReason, Trade};

/// Direction of a position or trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Long,
    Short,
}

impl TradeDirection {
    /// Price movement in the trade's favour: `to - from` for longs, `from - to` for shorts.
    pub fn favourable_move(&self, from: f64, to: f64) -> f64 {
        match self {
            TradeDirection::Long => to - from,
            TradeDirection::Short => from - to,
        }
    }

    /// Growth factor of moving from `entry` to `exit`.
    pub fn growth(&self, entry: f64, exit: f64) -> f64 {
        match self {
            TradeDirection::Long => exit / entry,
            TradeDirection::Short => entry / exit,
        }
    }
}

/// One entry of a recorded stop-price or risk-percentage series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimestampedValue {
    pub time: NaiveDateTime,
    pub value: f64,
}

/// An open position, owned and mutated by the backtest loop while it is held.
///
/// Closing consumes the position, so each position yields exactly one [`Trade`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub direction: TradeDirection,
    pub entry_time: NaiveDateTime,
    pub entry_price: f64,
    /// Direction-adjusted profit per unit at the last marked close.
    pub profit: f64,
    pub profit_pct: f64,
    pub growth: f64,
    pub initial_unit_risk: Option<f64>,
    pub initial_risk_pct: Option<f64>,
    pub cur_risk_pct: Option<f64>,
    pub cur_r_multiple: Option<f64>,
    pub initial_stop_price: Option<f64>,
    pub cur_stop_price: Option<f64>,
    pub stop_price_series: Option<Vec<TimestampedValue>>,
    pub risk_series: Option<Vec<TimestampedValue>>,
    pub holding_period: usize,
    pub profit_target: Option<f64>,
}

impl Position {
    pub fn new(direction: TradeDirection, entry_time: NaiveDateTime, entry_price: f64) -> Self {
        Self {
            direction,
            entry_time,
            entry_price,
            profit: 0.0,
            profit_pct: 0.0,
            growth: 1.0,
            initial_unit_risk: None,
            initial_risk_pct: None,
            cur_risk_pct: None,
            cur_r_multiple: None,
            initial_stop_price: None,
            cur_stop_price: None,
            stop_price_series: None,
            risk_series: None,
            holding_period: 0,
            profit_target: None,
        }
    }

    /// Direction-adjusted profit per unit if the position were closed at `price`.
    pub fn unrealized_profit(&self, price: f64) -> f64 {
        self.direction.favourable_move(self.entry_price, price)
    }

    /// True if `low`/`high` of a bar reaches the current stop.
    pub fn stop_breached(&self, low: f64, high: f64) -> bool {
        match (self.cur_stop_price, self.direction) {
            (Some(stop), TradeDirection::Long) => low <= stop,
            (Some(stop), TradeDirection::Short) => high >= stop,
            (None, _) => false,
        }
    }

    /// True if `low`/`high` of a bar reaches the profit target.
    pub fn target_reached(&self, low: f64, high: f64) -> bool {
        match (self.profit_target, self.direction) {
            (Some(target), TradeDirection::Long) => high >= target,
            (Some(target), TradeDirection::Short) => low <= target,
            (None, _) => false,
        }
    }

    pub(crate) fn record_stop(&mut self, time: NaiveDateTime) {
        if let (Some(series), Some(stop)) = (self.stop_price_series.as_mut(), self.cur_stop_price) {
            series.push(TimestampedValue { time, value: stop });
        }
    }

    pub(crate) fn record_risk(&mut self, time: NaiveDateTime) {
        if let (Some(series), Some(risk)) = (self.risk_series.as_mut(), self.cur_risk_pct) {
            series.push(TimestampedValue { time, value: risk });
        }
    }

    /// Close the position and produce its trade record.
    pub fn close(self, exit_time: NaiveDateTime, exit_price: f64, exit_reason: ExitReason) -> Trade {
        let profit = self.unrealized_profit(exit_price);
        let r_multiple = match self.initial_unit_risk {
            Some(risk) if risk != 0.0 => profit / risk,
            _ => 0.0,
        };
        Trade {
            direction: self.direction,
            entry_time: self.entry_time,
            entry_price: self.entry_price,
            exit_time,
            exit_price,
            profit,
            profit_pct: profit / self.entry_price * 100.0,
            growth: self.direction.growth(self.entry_price, exit_price),
            risk_pct: self.initial_risk_pct,
            r_multiple,
            holding_period: self.holding_period,
            exit_reason,
            stop_price: self.initial_stop_price,
            stop_price_series: self.stop_price_series,
            risk_series: self.risk_series,
            profit_target: self.profit_target,
        }
    }
}
