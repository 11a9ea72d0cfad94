//! Position lifecycle state machine.
//!
//! One pass over the bars, one state per bar:
//!
//! - `None`: flat, ask the entry rule.
//! - `Enter`: entry requested, fill at this bar's open (limit permitting).
//! - `Position`: stop breach, trailing stop, profit target, then the exit rule.
//! - `Exit`: exit requested, close at this bar's open.
//!
//! Rules are not consulted until the lookback window is full. A position
//! still open after the last bar is closed at the last close.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Bar, ExitReason, Position, Trade, TradeDirection};
use crate::strategy::{Decision, EntryContext, PositionContext, Strategy};

use super::lookback::RingBuffer;
use super::risk::{self, StopRatchet};

/// State of the lifecycle machine between bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionStatus {
    #[default]
    None,
    Enter,
    Position,
    Exit,
}

/// Optional bookkeeping recorded on open positions and carried onto trades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestOptions {
    /// Record a stop-price snapshot whenever the stop is set or trailed.
    pub record_stop_price: bool,
    /// Record a risk-percentage snapshot on every marked bar.
    pub record_risk: bool,
}

/// Closed trades in chronological order plus the state after the last bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestOutcome {
    pub trades: Vec<Trade>,
    pub final_status: PositionStatus,
}

impl BacktestOutcome {
    fn empty() -> Self {
        Self {
            trades: Vec::new(),
            final_status: PositionStatus::None,
        }
    }
}

/// Entry requested on a previous bar, waiting for its fill.
#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    direction: TradeDirection,
    limit_price: Option<f64>,
}

impl PendingEntry {
    fn triggered_by(&self, bar: &Bar) -> bool {
        match (self.limit_price, self.direction) {
            (None, _) => true,
            (Some(limit), TradeDirection::Long) => bar.high >= limit,
            (Some(limit), TradeDirection::Short) => bar.low <= limit,
        }
    }
}

/// An open position together with the ratchet guarding its stop.
struct OpenPosition {
    position: Position,
    ratchet: StopRatchet,
}

/// Run `strategy` over `bars`.
///
/// Returns an empty outcome when there are fewer bars than the strategy's
/// lookback period (at least one bar is always required).
pub fn backtest(strategy: &Strategy, bars: &[Bar], options: &BacktestOptions) -> BacktestOutcome {
    let required = strategy.required_bars();
    if bars.len() < required {
        debug!(
            strategy = %strategy.name,
            bars = bars.len(),
            required,
            "not enough bars for lookback, skipping run"
        );
        return BacktestOutcome::empty();
    }
    if bars.windows(2).any(|w| w[1].time < w[0].time) {
        warn!(strategy = %strategy.name, "bars are not in chronological order");
    }

    let mut lookback: RingBuffer<&Bar> = RingBuffer::new(required);
    let mut status = PositionStatus::None;
    let mut pending: Option<PendingEntry> = None;
    let mut open: Option<OpenPosition> = None;
    let mut trades = Vec::new();

    for bar in bars {
        lookback.push(bar);
        if !lookback.is_full() {
            continue;
        }

        match status {
            // ─── Flat ───
            PositionStatus::None => {
                let ctx = EntryContext {
                    bar,
                    lookback: &lookback,
                    parameters: &strategy.parameters,
                };
                // An exit request while flat is meaningless and ignored.
                if let Decision::Enter {
                    direction,
                    limit_price,
                } = (strategy.entry_rule)(&ctx)
                {
                    pending = Some(PendingEntry {
                        direction,
                        limit_price,
                    });
                    status = PositionStatus::Enter;
                }
            }

            // ─── Awaiting fill ───
            PositionStatus::Enter => {
                let Some(entry) = pending else {
                    status = PositionStatus::None;
                    continue;
                };
                if entry.triggered_by(bar) {
                    let held = open_position(strategy, entry.direction, bar, &lookback, options);
                    open = Some(held);
                    pending = None;
                    status = PositionStatus::Position;
                }
            }

            // ─── Holding ───
            PositionStatus::Position => {
                let Some(held) = open.as_mut() else {
                    status = PositionStatus::None;
                    continue;
                };
                let closed = step_position(strategy, held, bar, &lookback, options, &mut status);
                if let Some((price, reason)) = closed {
                    if let Some(held) = open.take() {
                        trades.push(held.position.close(bar.time, price, reason));
                    }
                    status = PositionStatus::None;
                }
            }

            // ─── Awaiting exit ───
            PositionStatus::Exit => {
                if let Some(held) = open.take() {
                    trades.push(held.position.close(bar.time, bar.open, ExitReason::ExitRule));
                }
                status = PositionStatus::None;
            }
        }
    }

    if let (Some(held), Some(last)) = (open.take(), bars.last()) {
        trades.push(held.position.close(last.time, last.close, ExitReason::Finalize));
        status = PositionStatus::None;
    }

    debug!(
        strategy = %strategy.name,
        trades = trades.len(),
        final_status = ?status,
        "backtest complete"
    );

    BacktestOutcome {
        trades,
        final_status: status,
    }
}

/// Fill an entry at the bar's open and initialise stop, risk and target.
fn open_position(
    strategy: &Strategy,
    direction: TradeDirection,
    bar: &Bar,
    lookback: &RingBuffer<&Bar>,
    options: &BacktestOptions,
) -> OpenPosition {
    let entry_price = bar.open;
    let mut position = Position::new(direction, bar.time, entry_price);
    if options.record_stop_price {
        position.stop_price_series = Some(Vec::new());
    }
    if options.record_risk {
        position.risk_series = Some(Vec::new());
    }

    let (stop_distance, trailing_distance, target_distance) = {
        let ctx = PositionContext {
            entry_price,
            position: &position,
            bar,
            lookback,
            parameters: &strategy.parameters,
        };
        (
            strategy.stop_loss.as_ref().and_then(|f| f(&ctx)),
            strategy.trailing_stop_loss.as_ref().and_then(|f| f(&ctx)),
            strategy.profit_target.as_ref().and_then(|f| f(&ctx)),
        )
    };

    let mut ratchet = StopRatchet::new(direction);
    if let Some(distance) = stop_distance {
        ratchet.apply(risk::stop_price(direction, entry_price, distance));
    }
    if let Some(distance) = trailing_distance {
        ratchet.apply(risk::stop_price(direction, entry_price, distance));
    }

    if let Some(stop) = ratchet.level() {
        let unit_risk = risk::unit_risk(direction, entry_price, stop);
        let risk_pct = risk::risk_pct(unit_risk, entry_price);
        position.initial_stop_price = Some(stop);
        position.cur_stop_price = Some(stop);
        position.initial_unit_risk = Some(unit_risk);
        position.initial_risk_pct = Some(risk_pct);
        position.cur_risk_pct = Some(risk_pct);
        position.cur_r_multiple = Some(0.0);
        position.record_stop(bar.time);
        position.record_risk(bar.time);
    }

    if let Some(distance) = target_distance {
        position.profit_target = Some(risk::target_price(direction, entry_price, distance));
    }

    OpenPosition { position, ratchet }
}

/// Process one bar of a held position.
///
/// Returns the exit price and reason when the position closes on this bar.
/// Sets `status` to `Exit` when the exit rule asks to leave at the next open.
fn step_position(
    strategy: &Strategy,
    held: &mut OpenPosition,
    bar: &Bar,
    lookback: &RingBuffer<&Bar>,
    options: &BacktestOptions,
    status: &mut PositionStatus,
) -> Option<(f64, ExitReason)> {
    let direction = held.position.direction;
    let entry_price = held.position.entry_price;

    // 1. Stop breach
    if held.position.stop_breached(bar.low, bar.high) {
        if let Some(stop) = held.position.cur_stop_price {
            return Some((stop, ExitReason::StopLoss));
        }
    }

    // 2. Trailing stop, from the close, tighten only
    let trailing_distance = strategy.trailing_stop_loss.as_ref().and_then(|trailing| {
        trailing(&PositionContext {
            entry_price,
            position: &held.position,
            bar,
            lookback,
            parameters: &strategy.parameters,
        })
    });
    if let Some(distance) = trailing_distance {
        let level = held.ratchet.apply(risk::stop_price(direction, bar.close, distance));
        held.position.cur_stop_price = Some(level);
        if options.record_stop_price {
            held.position.record_stop(bar.time);
        }
    }

    // 3. Profit target
    if held.position.target_reached(bar.low, bar.high) {
        if let Some(target) = held.position.profit_target {
            return Some((target, ExitReason::ProfitTarget));
        }
    }

    // 4. Mark to close, then the exit rule
    let position = &mut held.position;
    position.profit = position.unrealized_profit(bar.close);
    position.profit_pct = position.profit / entry_price * 100.0;
    position.growth = direction.growth(entry_price, bar.close);
    position.holding_period += 1;
    if let Some(stop) = position.cur_stop_price {
        let unit_risk = risk::unit_risk(direction, bar.close, stop);
        position.cur_risk_pct = Some(risk::risk_pct(unit_risk, bar.close));
        position.cur_r_multiple = Some(risk::r_multiple(position.profit, position.initial_unit_risk));
    }
    if options.record_risk {
        position.record_risk(bar.time);
    }

    if let Some(exit_rule) = strategy.exit_rule.as_ref() {
        let decision = exit_rule(&PositionContext {
            entry_price,
            position: &held.position,
            bar,
            lookback,
            parameters: &strategy.parameters,
        });
        // An entry request while holding is ignored.
        if decision == Decision::Exit {
            *status = PositionStatus::Exit;
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn t(i: usize) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + chrono::Duration::days(i as i64)
    }

    fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(t(i), open, high, low, close)
    }

    fn flat_bars(n: usize, price: f64) -> Vec<Bar> {
        (0..n).map(|i| bar(i, price, price, price, price)).collect()
    }

    fn always_long() -> Strategy {
        Strategy::new("always-long", |_| Decision::enter_long())
    }

    #[test]
    fn empty_bars_yield_empty_outcome() {
        let outcome = backtest(&always_long(), &[], &BacktestOptions::default());
        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.final_status, PositionStatus::None);
    }

    #[test]
    fn bars_shorter_than_lookback_yield_empty_outcome() {
        let strategy = always_long().with_lookback(10);
        let outcome = backtest(&strategy, &flat_bars(9, 10.0), &BacktestOptions::default());
        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.final_status, PositionStatus::None);
    }

    #[test]
    fn entry_fills_at_next_open() {
        let bars = vec![
            bar(0, 10.0, 10.0, 10.0, 10.0),
            bar(1, 11.0, 12.0, 11.0, 12.0),
            bar(2, 12.0, 13.0, 12.0, 13.0),
        ];
        let outcome = backtest(&always_long(), &bars, &BacktestOptions::default());
        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert_eq!(trade.entry_time, t(1));
        assert_eq!(trade.entry_price, 11.0);
        assert_eq!(trade.exit_price, 13.0);
        assert_eq!(trade.exit_reason, ExitReason::Finalize);
        assert_eq!(trade.holding_period, 1);
    }

    #[test]
    fn long_limit_waits_until_high_reaches_it() {
        let strategy = Strategy::new("limit", |_| Decision::enter_at_limit(TradeDirection::Long, 15.0));
        let bars = vec![
            bar(0, 10.0, 10.0, 10.0, 10.0),
            bar(1, 10.0, 14.0, 10.0, 13.0),
            bar(2, 13.0, 15.5, 12.0, 15.0),
            bar(3, 15.0, 16.0, 15.0, 16.0),
        ];
        let outcome = backtest(&strategy, &bars, &BacktestOptions::default());
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].entry_time, t(2));
        assert_eq!(outcome.trades[0].entry_price, 13.0);
    }

    #[test]
    fn short_limit_fills_once_low_reaches_it() {
        let strategy = Strategy::new("limit", |_| Decision::enter_at_limit(TradeDirection::Short, 8.0));
        let bars = vec![
            bar(0, 10.0, 10.0, 10.0, 10.0),
            bar(1, 10.0, 10.5, 9.0, 9.5),
            bar(2, 9.0, 9.5, 7.5, 8.0),
            bar(3, 8.0, 8.0, 7.0, 7.0),
        ];
        let outcome = backtest(&strategy, &bars, &BacktestOptions::default());
        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert_eq!(trade.direction, TradeDirection::Short);
        assert_eq!(trade.entry_time, t(2));
        assert_eq!(trade.entry_price, 9.0);
        assert_eq!(trade.exit_reason, ExitReason::Finalize);
        assert_eq!(trade.profit, 2.0);
    }

    #[test]
    fn unfilled_limit_leaves_enter_status() {
        let strategy = Strategy::new("limit", |_| Decision::enter_at_limit(TradeDirection::Short, 1.0));
        let outcome = backtest(&strategy, &flat_bars(5, 10.0), &BacktestOptions::default());
        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.final_status, PositionStatus::Enter);
    }

    #[test]
    fn stop_loss_closes_at_stop_price() {
        let strategy = always_long().with_stop_loss(|_| Some(10.0));
        let bars = vec![
            bar(0, 100.0, 100.0, 100.0, 100.0),
            bar(1, 100.0, 101.0, 99.0, 100.0),
            bar(2, 100.0, 100.0, 85.0, 88.0),
            bar(3, 88.0, 88.0, 88.0, 88.0),
        ];
        let outcome = backtest(&strategy, &bars, &BacktestOptions::default());
        let trade = &outcome.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!((trade.exit_price - 90.0).abs() < 1e-9);
        assert!((trade.r_multiple + 1.0).abs() < 1e-9);
        assert_eq!(trade.risk_pct, Some(10.0));
        assert_eq!(trade.exit_time, t(2));
    }

    #[test]
    fn profit_target_closes_at_target() {
        let strategy = always_long().with_profit_target(|_| Some(5.0));
        let bars = vec![
            bar(0, 100.0, 100.0, 100.0, 100.0),
            bar(1, 100.0, 102.0, 100.0, 101.0),
            bar(2, 101.0, 107.0, 101.0, 106.0),
        ];
        let outcome = backtest(&strategy, &bars, &BacktestOptions::default());
        let trade = &outcome.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::ProfitTarget);
        assert_eq!(trade.exit_price, 105.0);
        assert_eq!(trade.profit_target, Some(105.0));
        // no stop, no risk
        assert_eq!(trade.r_multiple, 0.0);
    }

    #[test]
    fn short_profit_target_closes_below_entry() {
        let strategy = Strategy::new("short", |_| Decision::enter_short()).with_profit_target(|_| Some(5.0));
        let bars = vec![
            bar(0, 100.0, 100.0, 100.0, 100.0),
            bar(1, 100.0, 101.0, 98.0, 99.0),
            bar(2, 99.0, 99.5, 94.0, 96.0),
            bar(3, 96.0, 96.0, 96.0, 96.0),
        ];
        let outcome = backtest(&strategy, &bars, &BacktestOptions::default());
        let trade = &outcome.trades[0];
        assert_eq!(trade.profit_target, Some(95.0));
        assert_eq!(trade.exit_reason, ExitReason::ProfitTarget);
        assert_eq!(trade.exit_time, t(2));
        assert_eq!(trade.exit_price, 95.0);
        assert_eq!(trade.profit, 5.0);
    }

    #[test]
    fn exit_rule_closes_at_following_open() {
        let strategy = always_long().with_exit_rule(|ctx| {
            if ctx.position.holding_period >= 2 {
                Decision::Exit
            } else {
                Decision::NoAction
            }
        });
        let bars: Vec<Bar> = (0..6)
            .map(|i| {
                let p = 10.0 + i as f64;
                bar(i, p - 0.5, p, p - 1.0, p)
            })
            .collect();
        let outcome = backtest(&strategy, &bars, &BacktestOptions::default());
        // enter t1, held t2 (1), t3 (2, exit requested), exit t4 open
        let first = &outcome.trades[0];
        assert_eq!(first.exit_reason, ExitReason::ExitRule);
        assert_eq!(first.exit_time, t(4));
        assert_eq!(first.exit_price, 13.5);
        assert_eq!(first.holding_period, 2);
    }

    #[test]
    fn short_trade_profit_and_growth() {
        let strategy = Strategy::new("short", |_| Decision::enter_short());
        let bars = vec![
            bar(0, 50.0, 50.0, 50.0, 50.0),
            bar(1, 50.0, 50.0, 45.0, 45.0),
            bar(2, 45.0, 45.0, 40.0, 40.0),
        ];
        let outcome = backtest(&strategy, &bars, &BacktestOptions::default());
        let trade = &outcome.trades[0];
        assert_eq!(trade.profit, 10.0);
        assert!((trade.growth - 50.0 / 40.0).abs() < 1e-12);
    }

    #[test]
    fn trailing_stop_tightens_and_records() {
        let strategy = always_long().with_trailing_stop_loss(|_| Some(2.0));
        let options = BacktestOptions {
            record_stop_price: true,
            record_risk: true,
        };
        let bars = vec![
            bar(0, 10.0, 10.0, 10.0, 10.0),
            bar(1, 10.0, 10.5, 9.5, 10.0),
            bar(2, 10.0, 12.5, 9.5, 12.0),
            bar(3, 12.0, 12.0, 11.0, 11.0),
            bar(4, 11.0, 11.0, 9.5, 9.5),
        ];
        let outcome = backtest(&strategy, &bars, &options);
        let trade = &outcome.trades[0];
        let stops: Vec<f64> = trade
            .stop_price_series
            .as_ref()
            .unwrap()
            .iter()
            .map(|s| s.value)
            .collect();
        // entry 8, bar2 close 12 -> 10, bar3 close 11 -> 9 rejected
        assert_eq!(stops, vec![8.0, 10.0, 10.0]);
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_price, 10.0);
        assert!(trade.risk_series.as_ref().unwrap().len() >= 2);
    }

    #[test]
    fn trailing_and_hard_stop_keep_more_protective() {
        let strategy = always_long()
            .with_stop_loss(|_| Some(5.0))
            .with_trailing_stop_loss(|_| Some(2.0));
        let bars = flat_bars(3, 100.0);
        let outcome = backtest(&strategy, &bars, &BacktestOptions::default());
        assert_eq!(outcome.trades[0].stop_price, Some(98.0));
    }

    #[test]
    fn series_absent_unless_requested() {
        let strategy = always_long().with_stop_loss(|_| Some(1.0));
        let outcome = backtest(&strategy, &flat_bars(4, 10.0), &BacktestOptions::default());
        assert!(outcome.trades[0].stop_price_series.is_none());
        assert!(outcome.trades[0].risk_series.is_none());
    }

    #[test]
    fn exit_decision_from_entry_rule_is_ignored() {
        let strategy = Strategy::new("confused", |_| Decision::Exit);
        let outcome = backtest(&strategy, &flat_bars(5, 10.0), &BacktestOptions::default());
        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.final_status, PositionStatus::None);
    }

    #[test]
    fn lookback_delays_first_entry() {
        let strategy = always_long().with_lookback(3);
        let bars: Vec<Bar> = (0..5)
            .map(|i| {
                let p = i as f64 + 1.0;
                bar(i, p, p, p, p)
            })
            .collect();
        let outcome = backtest(&strategy, &bars, &BacktestOptions::default());
        // window full at index 2, fill at index 3
        assert_eq!(outcome.trades[0].entry_time, t(3));
    }
}
