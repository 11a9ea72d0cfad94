//! Risk and stop bookkeeping.
//!
//! **Core rule:** once a position is open its stop may tighten, never loosen.
//!
//! Distances come from the strategy's rule functions; everything here turns
//! them into absolute prices and risk figures.

use crate::domain::TradeDirection;

/// Absolute stop price `distance` away from `reference`, on the losing side.
pub fn stop_price(direction: TradeDirection, reference: f64, distance: f64) -> f64 {
    match direction {
        TradeDirection::Long => reference - distance,
        TradeDirection::Short => reference + distance,
    }
}

/// Absolute profit-target price `distance` away from `entry`, on the winning side.
pub fn target_price(direction: TradeDirection, entry: f64, distance: f64) -> f64 {
    match direction {
        TradeDirection::Long => entry + distance,
        TradeDirection::Short => entry - distance,
    }
}

/// The tighter of two stops: the higher for longs, the lower for shorts.
pub fn more_protective(direction: TradeDirection, a: f64, b: f64) -> f64 {
    match direction {
        TradeDirection::Long => a.max(b),
        TradeDirection::Short => a.min(b),
    }
}

/// Per-unit amount at risk between `price` and `stop`.
pub fn unit_risk(direction: TradeDirection, price: f64, stop: f64) -> f64 {
    direction.favourable_move(stop, price)
}

/// Unit risk as a percentage of `price`.
pub fn risk_pct(unit_risk: f64, price: f64) -> f64 {
    if price == 0.0 {
        return 0.0;
    }
    unit_risk / price * 100.0
}

/// Running profit expressed in units of the initial risk. 0 without a risk.
pub fn r_multiple(profit: f64, initial_unit_risk: Option<f64>) -> f64 {
    match initial_unit_risk {
        Some(risk) if risk != 0.0 => profit / risk,
        _ => 0.0,
    }
}

/// Enforces stop monotonicity for one position.
///
/// - Long: the level can only rise.
/// - Short: the level can only fall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopRatchet {
    direction: TradeDirection,
    level: Option<f64>,
}

impl StopRatchet {
    pub fn new(direction: TradeDirection) -> Self {
        Self {
            direction,
            level: None,
        }
    }

    pub fn with_level(direction: TradeDirection, level: Option<f64>) -> Self {
        Self { direction, level }
    }

    /// Offer a new stop level and return the level in force afterwards.
    /// The first offer is always accepted.
    pub fn apply(&mut self, proposed: f64) -> f64 {
        let next = match self.level {
            None => proposed,
            Some(current) => more_protective(self.direction, current, proposed),
        };
        self.level = Some(next);
        next
    }

    pub fn level(&self) -> Option<f64> {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn stop_and_target_sides() {
        assert!((stop_price(TradeDirection::Long, 100.0, 5.0) - 95.0).abs() < EPS);
        assert!((stop_price(TradeDirection::Short, 100.0, 5.0) - 105.0).abs() < EPS);
        assert!((target_price(TradeDirection::Long, 100.0, 5.0) - 105.0).abs() < EPS);
        assert!((target_price(TradeDirection::Short, 100.0, 5.0) - 95.0).abs() < EPS);
    }

    #[test]
    fn more_protective_picks_tighter_stop() {
        assert_eq!(more_protective(TradeDirection::Long, 95.0, 97.0), 97.0);
        assert_eq!(more_protective(TradeDirection::Short, 105.0, 103.0), 103.0);
    }

    #[test]
    fn unit_risk_is_positive_for_protective_stops() {
        assert!((unit_risk(TradeDirection::Long, 100.0, 95.0) - 5.0).abs() < EPS);
        assert!((unit_risk(TradeDirection::Short, 100.0, 105.0) - 5.0).abs() < EPS);
    }

    #[test]
    fn risk_pct_of_price() {
        assert!((risk_pct(5.0, 100.0) - 5.0).abs() < EPS);
        assert!((risk_pct(2.0, 50.0) - 4.0).abs() < EPS);
        assert_eq!(risk_pct(2.0, 0.0), 0.0);
    }

    #[test]
    fn r_multiple_without_risk_is_zero() {
        assert_eq!(r_multiple(10.0, None), 0.0);
        assert_eq!(r_multiple(10.0, Some(0.0)), 0.0);
        assert!((r_multiple(10.0, Some(5.0)) - 2.0).abs() < EPS);
    }

    #[test]
    fn long_ratchet_never_loosens() {
        let mut ratchet = StopRatchet::with_level(TradeDirection::Long, Some(95.0));
        assert_eq!(ratchet.apply(100.0), 100.0);
        assert_eq!(ratchet.apply(90.0), 100.0);
        assert_eq!(ratchet.level(), Some(100.0));
    }

    #[test]
    fn short_ratchet_never_loosens() {
        let mut ratchet = StopRatchet::with_level(TradeDirection::Short, Some(105.0));
        assert_eq!(ratchet.apply(101.0), 101.0);
        assert_eq!(ratchet.apply(110.0), 101.0);
    }

    #[test]
    fn first_offer_initialises() {
        let mut ratchet = StopRatchet::new(TradeDirection::Long);
        assert_eq!(ratchet.level(), None);
        assert_eq!(ratchet.apply(42.0), 42.0);
    }
}
