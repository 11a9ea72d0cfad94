//! Performance analytics reducer.
//!
//! One left-to-right pass over closed trades, compounding capital by each
//! trade's growth factor and tracking the drawdown from the running peak.

use serde::{Deserialize, Serialize};

use crate::domain::Trade;

use super::retracement::max_retracement;

/// Scalar summary of a trade list.
///
/// Profit totals, averages and expected value are per unit (the trades'
/// own `profit`), while capital and drawdown follow the compounded curve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub starting_capital: f64,
    pub final_capital: f64,
    pub profit: f64,
    pub profit_pct: f64,
    pub growth: f64,
    pub total_trades: usize,
    /// Sum of holding periods.
    pub bar_count: usize,
    /// Most negative `capital - peak`, always ≤ 0.
    pub max_drawdown: f64,
    /// `max_drawdown` as a percentage of the peak it was measured from.
    pub max_drawdown_pct: f64,
    pub max_risk_pct: Option<f64>,
    /// Mean R-multiple over trades that had an initial risk.
    pub expectancy: f64,
    pub r_multiple_std_dev: f64,
    pub system_quality: f64,
    pub profit_factor: f64,
    pub return_on_account: f64,
    pub avg_profit_per_trade: f64,
    pub total_winning_trades: usize,
    pub total_losing_trades: usize,
    pub proportion_winning: f64,
    pub proportion_losing: f64,
    pub percent_profitable: f64,
    pub average_winning_trade: f64,
    pub average_losing_trade: f64,
    pub expected_value: f64,
    pub max_retracement_pct: Option<f64>,
}

impl AnalysisReport {
    /// Fill in the retracement metric from the trades' recorded series.
    pub fn with_retracement(mut self, trades: &[Trade]) -> Self {
        self.max_retracement_pct = max_retracement(trades);
        self
    }
}

/// Reduce `trades` to a report.
///
/// A non-positive or non-finite `starting_capital` yields a zeroed report.
pub fn analyze(starting_capital: f64, trades: &[Trade]) -> AnalysisReport {
    if !(starting_capital.is_finite() && starting_capital > 0.0) {
        return AnalysisReport::default();
    }

    let mut capital = starting_capital;
    let mut peak = starting_capital;
    let mut max_drawdown = 0.0_f64;
    let mut max_drawdown_pct = 0.0_f64;
    let mut max_risk_pct: Option<f64> = None;
    let mut bar_count = 0usize;

    let mut total_profits = 0.0_f64;
    let mut total_losses = 0.0_f64;
    let mut wins = 0usize;
    let mut losses = 0usize;
    let mut r_multiples: Vec<f64> = Vec::with_capacity(trades.len());

    for trade in trades {
        capital *= trade.growth;
        let drawdown = if capital < peak {
            capital - peak
        } else {
            peak = capital;
            0.0
        };
        if drawdown < max_drawdown {
            max_drawdown = drawdown;
            max_drawdown_pct = drawdown / peak * 100.0;
        }

        if let Some(risk) = trade.risk_pct {
            max_risk_pct = Some(max_risk_pct.map_or(risk, |m| m.max(risk)));
            r_multiples.push(trade.r_multiple);
        }
        bar_count += trade.holding_period;

        if trade.is_winner() {
            total_profits += trade.profit;
            wins += 1;
        } else if trade.is_loser() {
            total_losses += trade.profit;
            losses += 1;
        }
    }

    // ─── Post-pass ratios ───

    let total_trades = trades.len();
    let profit = capital - starting_capital;
    let profit_pct = profit / starting_capital * 100.0;

    let expectancy = mean(&r_multiples);
    let r_multiple_std_dev = population_std_dev(&r_multiples, expectancy);
    let system_quality = if r_multiple_std_dev == 0.0 {
        0.0
    } else {
        expectancy / r_multiple_std_dev
    };

    let profit_factor = if total_losses == 0.0 {
        0.0
    } else {
        total_profits / total_losses.abs()
    };
    let return_on_account = if max_drawdown_pct == 0.0 {
        0.0
    } else {
        profit_pct / max_drawdown_pct.abs()
    };

    let ratio = |n: usize| {
        if total_trades == 0 {
            0.0
        } else {
            n as f64 / total_trades as f64
        }
    };
    let proportion_winning = ratio(wins);
    let proportion_losing = ratio(losses);
    let average_winning_trade = if wins > 0 { total_profits / wins as f64 } else { 0.0 };
    let average_losing_trade = if losses > 0 { total_losses / losses as f64 } else { 0.0 };
    let avg_profit_per_trade = if total_trades > 0 {
        profit / total_trades as f64
    } else {
        0.0
    };

    AnalysisReport {
        starting_capital,
        final_capital: capital,
        profit,
        profit_pct,
        growth: capital / starting_capital,
        total_trades,
        bar_count,
        max_drawdown,
        max_drawdown_pct,
        max_risk_pct,
        expectancy,
        r_multiple_std_dev,
        system_quality,
        profit_factor,
        return_on_account,
        avg_profit_per_trade,
        total_winning_trades: wins,
        total_losing_trades: losses,
        proportion_winning,
        proportion_losing,
        percent_profitable: proportion_winning * 100.0,
        average_winning_trade,
        average_losing_trade,
        expected_value: proportion_winning * average_winning_trade
            + proportion_losing * average_losing_trade,
        max_retracement_pct: None,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Divides by N, not N - 1.
fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
