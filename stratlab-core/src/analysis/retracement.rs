//! Maximum adverse retracement, reconstructed from recorded stop and risk series.
//!
//! For every snapshot time present in both series the unleveraged price is
//! recovered from the stop and the risk percentage:
//!
//! - long: `price = stop / (1 - risk / 100)`
//! - short: `price = stop / (1 + risk / 100)`
//!
//! A zero denominator falls back to the stop itself. Within each trade the
//! reconstructed price is compared with its best level so far.

use std::collections::BTreeMap;

use crate::domain::{TimestampedValue, Trade, TradeDirection};

/// Worst (most negative) retracement percentage over all trades, or `None`
/// if no trade carries both a stop-price and a risk series with a shared
/// timestamp.
pub fn max_retracement(trades: &[Trade]) -> Option<f64> {
    trades
        .iter()
        .filter_map(trade_retracement)
        .reduce(f64::min)
}

/// Worst retracement within one trade.
pub fn trade_retracement(trade: &Trade) -> Option<f64> {
    let stops = trade.stop_price_series.as_deref()?;
    let risks = trade.risk_series.as_deref()?;
    let prices = implied_prices(trade.direction, stops, risks);

    let mut iter = prices.into_iter();
    let mut peak = iter.next()?;
    let mut worst = 0.0_f64;
    for price in iter {
        let favourable = trade.direction.favourable_move(peak, price);
        if favourable > 0.0 {
            peak = price;
        } else if peak != 0.0 {
            worst = worst.min(favourable / peak * 100.0);
        }
    }
    Some(worst)
}

/// Reconstructed prices, in stop-series order, for timestamps present in both series.
pub fn implied_prices(
    direction: TradeDirection,
    stops: &[TimestampedValue],
    risks: &[TimestampedValue],
) -> Vec<f64> {
    let risk_at: BTreeMap<_, f64> = risks.iter().map(|r| (r.time, r.value)).collect();
    stops
        .iter()
        .filter_map(|stop| {
            let risk = risk_at.get(&stop.time)?;
            Some(implied_price(direction, stop.value, *risk))
        })
        .collect()
}

pub fn implied_price(direction: TradeDirection, stop: f64, risk_pct: f64) -> f64 {
    let denominator = match direction {
        TradeDirection::Long => 1.0 - risk_pct / 100.0,
        TradeDirection::Short => 1.0 + risk_pct / 100.0,
    };
    if denominator == 0.0 {
        stop
    } else {
        stop / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ExitReason;
    use chrono::{NaiveDate, NaiveDateTime};

    fn t(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn series(values: &[(u32, f64)]) -> Vec<TimestampedValue> {
        values
            .iter()
            .map(|&(day, value)| TimestampedValue { time: t(day), value })
            .collect()
    }

    fn trade(direction: TradeDirection, stops: &[(u32, f64)], risks: &[(u32, f64)]) -> Trade {
        Trade {
            direction,
            entry_time: t(1),
            entry_price: 100.0,
            exit_time: t(28),
            exit_price: 100.0,
            profit: 0.0,
            profit_pct: 0.0,
            growth: 1.0,
            risk_pct: Some(10.0),
            r_multiple: 0.0,
            holding_period: 5,
            exit_reason: ExitReason::Finalize,
            stop_price: Some(90.0),
            stop_price_series: Some(series(stops)),
            risk_series: Some(series(risks)),
            profit_target: None,
        }
    }

    #[test]
    fn long_reconstruction_matches_stop_and_risk() {
        // stop 90 at 10% risk means price 100
        assert!((implied_price(TradeDirection::Long, 90.0, 10.0) - 100.0).abs() < 1e-9);
        assert!((implied_price(TradeDirection::Short, 110.0, 10.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn full_risk_falls_back_to_stop() {
        assert_eq!(implied_price(TradeDirection::Long, 50.0, 100.0), 50.0);
        assert_eq!(implied_price(TradeDirection::Short, 50.0, -100.0), 50.0);
    }

    #[test]
    fn long_retracement_from_peak() {
        // implied prices 100, 120, 90
        let tr = trade(
            TradeDirection::Long,
            &[(1, 90.0), (2, 108.0), (3, 81.0)],
            &[(1, 10.0), (2, 10.0), (3, 10.0)],
        );
        let worst = trade_retracement(&tr).unwrap();
        assert!((worst + 25.0).abs() < 1e-9);
    }

    #[test]
    fn short_retracement_is_mirrored() {
        // implied prices 100, 80, 96
        let tr = trade(
            TradeDirection::Short,
            &[(1, 110.0), (2, 88.0), (3, 105.6)],
            &[(1, 10.0), (2, 10.0), (3, 10.0)],
        );
        let worst = trade_retracement(&tr).unwrap();
        assert!((worst + 20.0).abs() < 1e-9);
    }

    #[test]
    fn unpaired_snapshots_are_skipped() {
        let tr = trade(
            TradeDirection::Long,
            &[(1, 90.0), (2, 50.0), (3, 99.0)],
            &[(1, 10.0), (3, 10.0)],
        );
        // 100 then 110, no retracement
        assert_eq!(trade_retracement(&tr), Some(0.0));
    }

    #[test]
    fn worst_across_trades() {
        let mild = trade(
            TradeDirection::Long,
            &[(1, 90.0), (2, 85.5)],
            &[(1, 10.0), (2, 10.0)],
        );
        let severe = trade(
            TradeDirection::Long,
            &[(1, 90.0), (2, 45.0)],
            &[(1, 10.0), (2, 10.0)],
        );
        let worst = max_retracement(&[mild, severe]).unwrap();
        assert!((worst + 50.0).abs() < 1e-9);
    }

    #[test]
    fn none_without_series() {
        let mut tr = trade(TradeDirection::Long, &[(1, 90.0)], &[(1, 10.0)]);
        tr.risk_series = None;
        assert_eq!(max_retracement(&[tr]), None);
        assert_eq!(max_retracement(&[]), None);
    }
}
