//! Strategy contract.
//!
//! A strategy is a bundle of pure rule functions plus a parameter map and the
//! length of the lookback window its rules need. Rules return a [`Decision`]
//! instead of mutating engine state, so the state machine can match every
//! transition exhaustively.
//!
//! Rules are stored behind `Arc`, which makes cloning a strategy with a new
//! parameter set (what the optimizer does for every coordinate) cheap.

use std::fmt;
use std::sync::Arc;

use crate::domain::{Bar, Parameters, Position, TradeDirection};
use crate::engine::lookback::RingBuffer;

// ─── Decisions ──────────────────────────────────────────────────────

/// What a rule asks the state machine to do on this bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    NoAction,
    /// Open a position. With a limit price, the fill waits until a bar trades through it.
    Enter {
        direction: TradeDirection,
        limit_price: Option<f64>,
    },
    /// Close the open position at the next bar's open.
    Exit,
}

impl Decision {
    pub fn enter(direction: TradeDirection) -> Self {
        Decision::Enter {
            direction,
            limit_price: None,
        }
    }

    pub fn enter_long() -> Self {
        Self::enter(TradeDirection::Long)
    }

    pub fn enter_short() -> Self {
        Self::enter(TradeDirection::Short)
    }

    pub fn enter_at_limit(direction: TradeDirection, limit_price: f64) -> Self {
        Decision::Enter {
            direction,
            limit_price: Some(limit_price),
        }
    }
}

// ─── Rule contexts ──────────────────────────────────────────────────

/// Everything the entry rule sees while flat.
#[derive(Clone, Copy)]
pub struct EntryContext<'a> {
    pub bar: &'a Bar,
    /// The most recent `lookback_period` bars, oldest first. The current bar is the newest.
    pub lookback: &'a RingBuffer<&'a Bar>,
    pub parameters: &'a Parameters,
}

impl EntryContext<'_> {
    pub fn param(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }
}

/// Everything the exit rule and the distance functions see while a position is held.
#[derive(Clone, Copy)]
pub struct PositionContext<'a> {
    pub entry_price: f64,
    pub position: &'a Position,
    pub bar: &'a Bar,
    pub lookback: &'a RingBuffer<&'a Bar>,
    pub parameters: &'a Parameters,
}

impl PositionContext<'_> {
    pub fn param(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }
}

/// Entry rule: decides whether to open a position while flat.
pub type EntryRule = Arc<dyn Fn(&EntryContext<'_>) -> Decision + Send + Sync>;

/// Exit rule: decides whether to close the open position.
pub type ExitRule = Arc<dyn Fn(&PositionContext<'_>) -> Decision + Send + Sync>;

/// Distance function for stop-loss, trailing stop and profit target.
/// Returns a price distance from the reference price, not an absolute price,
/// or `None` when the rule does not apply to this position.
pub type DistanceFn = Arc<dyn Fn(&PositionContext<'_>) -> Option<f64> + Send + Sync>;

/// Derives the lookback period from the parameters, for strategies whose
/// window length is itself a tunable parameter.
pub type LookbackFn = Arc<dyn Fn(&Parameters) -> usize + Send + Sync>;

// ─── Strategy ───────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Strategy {
    pub name: String,
    pub parameters: Parameters,
    pub lookback_period: usize,
    pub entry_rule: EntryRule,
    pub exit_rule: Option<ExitRule>,
    pub stop_loss: Option<DistanceFn>,
    pub trailing_stop_loss: Option<DistanceFn>,
    pub profit_target: Option<DistanceFn>,
    pub lookback_from: Option<LookbackFn>,
}

impl Strategy {
    /// A strategy with only an entry rule and a lookback of one bar.
    pub fn new<F>(name: impl Into<String>, entry_rule: F) -> Self
    where
        F: Fn(&EntryContext<'_>) -> Decision + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: Parameters::new(),
            lookback_period: 1,
            entry_rule: Arc::new(entry_rule),
            exit_rule: None,
            stop_loss: None,
            trailing_stop_loss: None,
            profit_target: None,
            lookback_from: None,
        }
    }

    pub fn with_lookback(mut self, lookback_period: usize) -> Self {
        self.lookback_period = lookback_period;
        self
    }

    /// Recompute the lookback period from the parameters whenever they change.
    pub fn with_lookback_from<F>(mut self, lookback: F) -> Self
    where
        F: Fn(&Parameters) -> usize + Send + Sync + 'static,
    {
        self.lookback_from = Some(Arc::new(lookback));
        self.refresh_lookback();
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(name.into(), value);
        self.refresh_lookback();
        self
    }

    pub fn with_exit_rule<F>(mut self, rule: F) -> Self
    where
        F: Fn(&PositionContext<'_>) -> Decision + Send + Sync + 'static,
    {
        self.exit_rule = Some(Arc::new(rule));
        self
    }

    pub fn with_stop_loss<F>(mut self, distance: F) -> Self
    where
        F: Fn(&PositionContext<'_>) -> Option<f64> + Send + Sync + 'static,
    {
        self.stop_loss = Some(Arc::new(distance));
        self
    }

    pub fn with_trailing_stop_loss<F>(mut self, distance: F) -> Self
    where
        F: Fn(&PositionContext<'_>) -> Option<f64> + Send + Sync + 'static,
    {
        self.trailing_stop_loss = Some(Arc::new(distance));
        self
    }

    pub fn with_profit_target<F>(mut self, distance: F) -> Self
    where
        F: Fn(&PositionContext<'_>) -> Option<f64> + Send + Sync + 'static,
    {
        self.profit_target = Some(Arc::new(distance));
        self
    }

    /// Clone with `overrides` merged over the default parameters.
    /// Rules are shared with `self`; a derived lookback is recomputed.
    pub fn with_overrides(&self, overrides: &Parameters) -> Self {
        let mut strategy = self.clone();
        strategy
            .parameters
            .extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        strategy.refresh_lookback();
        strategy
    }

    fn refresh_lookback(&mut self) {
        if let Some(lookback) = self.lookback_from.as_ref() {
            self.lookback_period = lookback(&self.parameters);
        }
    }

    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    /// Bars needed before any rule is evaluated.
    pub fn required_bars(&self) -> usize {
        self.lookback_period.max(1)
    }
}

impl fmt::Debug for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("lookback_period", &self.lookback_period)
            .field("exit_rule", &self.exit_rule.is_some())
            .field("stop_loss", &self.stop_loss.is_some())
            .field("trailing_stop_loss", &self.trailing_stop_loss.is_some())
            .field("profit_target", &self.profit_target.is_some())
            .field("lookback_from", &self.lookback_from.is_some())
            .finish()
    }
}
