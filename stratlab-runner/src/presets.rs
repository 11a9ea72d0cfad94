//! Built-in strategy catalog.
//!
//! Every preset reads its tunable values from the strategy's parameter map at
//! evaluation time, so the optimizer can retune a preset by merging parameter
//! overrides without rebuilding it.
//!
//! Risk parameters shared by all presets. The rules are always attached and
//! stay inactive for positions opened while their parameter is absent:
//! - `stop_pct`: stop-loss distance as a percentage of the entry price
//! - `trail_pct`: trailing-stop distance as a percentage of the bar close
//! - `target_pct`: profit-target distance as a percentage of the entry price

use stratlab_core::domain::{Bar, Parameters};
use stratlab_core::engine::RingBuffer;
use stratlab_core::strategy::{Decision, Strategy};

pub const PRESET_NAMES: [&str; 3] = ["breakout", "ma_cross", "mean_reversion"];

/// Unrecognised preset name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown preset '{0}' (available: breakout, ma_cross, mean_reversion)")]
pub struct UnknownPreset(pub String);

/// Build a preset by name with `parameters` merged over its defaults.
pub fn preset(name: &str, parameters: &Parameters) -> Result<Strategy, UnknownPreset> {
    let base = match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "breakout" => breakout(),
        "ma_cross" => ma_cross(),
        "mean_reversion" => mean_reversion(),
        _ => return Err(UnknownPreset(name.to_string())),
    };
    Ok(with_risk_rules(base.with_overrides(parameters)))
}

// ─── Presets ─────────────────────────────────────────────────────────

/// Channel breakout: long when the close clears the highest high of the prior
/// `entry_window` bars, out when it drops below the lowest low of the prior
/// `exit_window` bars.
pub fn breakout() -> Strategy {
    Strategy::new("breakout", |ctx| {
        let window = window_param(ctx.param("entry_window"));
        match prior_high(ctx.lookback, window) {
            Some(high) if ctx.bar.close > high => Decision::enter_long(),
            _ => Decision::NoAction,
        }
    })
    .with_parameter("entry_window", 20.0)
    .with_parameter("exit_window", 10.0)
    .with_lookback_from(|p| {
        let entry = window_param(p.get("entry_window").copied());
        let exit = window_param(p.get("exit_window").copied());
        entry.max(exit) + 1
    })
    .with_exit_rule(|ctx| {
        let window = window_param(ctx.param("exit_window"));
        match prior_low(ctx.lookback, window) {
            Some(low) if ctx.bar.close < low => Decision::Exit,
            _ => Decision::NoAction,
        }
    })
}

/// Moving-average cross over the bar's `fast_ma` and `slow_ma` values.
pub fn ma_cross() -> Strategy {
    Strategy::new("ma_cross", |ctx| {
        match (ctx.bar.value("fast_ma"), ctx.bar.value("slow_ma")) {
            (Some(fast), Some(slow)) if fast > slow => Decision::enter_long(),
            _ => Decision::NoAction,
        }
    })
    .with_exit_rule(|ctx| match (ctx.bar.value("fast_ma"), ctx.bar.value("slow_ma")) {
        (Some(fast), Some(slow)) if fast < slow => Decision::Exit,
        _ => Decision::NoAction,
    })
}

/// Buy when the close is `entry_pct` percent below the bar's `sma` value,
/// sell once it is back above it.
pub fn mean_reversion() -> Strategy {
    Strategy::new("mean_reversion", |ctx| {
        let entry_pct = ctx.param("entry_pct").unwrap_or(5.0);
        match ctx.bar.value("sma") {
            Some(sma) if ctx.bar.close <= sma * (1.0 - entry_pct / 100.0) => Decision::enter_long(),
            _ => Decision::NoAction,
        }
    })
    .with_parameter("entry_pct", 5.0)
    .with_exit_rule(|ctx| match ctx.bar.value("sma") {
        Some(sma) if ctx.bar.close > sma => Decision::Exit,
        _ => Decision::NoAction,
    })
}

// ─── Shared pieces ───────────────────────────────────────────────────

fn with_risk_rules(strategy: Strategy) -> Strategy {
    strategy
        .with_stop_loss(|ctx| pct_of(ctx.entry_price, ctx.param("stop_pct")))
        .with_trailing_stop_loss(|ctx| pct_of(ctx.bar.close, ctx.param("trail_pct")))
        .with_profit_target(|ctx| pct_of(ctx.entry_price, ctx.param("target_pct")))
}

fn pct_of(price: f64, pct: Option<f64>) -> Option<f64> {
    pct.map(|pct| price * pct / 100.0)
}

fn window_param(value: Option<f64>) -> usize {
    value.map_or(1, |v| v.round().max(1.0) as usize)
}

/// Bars before the current one, newest first, at most `window` of them.
fn prior<'a>(lookback: &'a RingBuffer<&'a Bar>, window: usize) -> impl Iterator<Item = &'a Bar> + 'a {
    lookback.iter().rev().skip(1).take(window)
}

fn prior_high(lookback: &RingBuffer<&Bar>, window: usize) -> Option<f64> {
    prior(lookback, window).map(|b| b.high).reduce(f64::max)
}

fn prior_low(lookback: &RingBuffer<&Bar>, window: usize) -> Option<f64> {
    prior(lookback, window).map(|b| b.low).reduce(f64::min)
}
