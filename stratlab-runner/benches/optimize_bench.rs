//! Criterion benchmarks for the parameter search.
//!
//! Benchmarks:
//! 1. Grid search, sequential vs rayon
//! 2. Hill-climbing with restarts

use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use stratlab_core::domain::{Bar, ParameterDef, Parameters};
use stratlab_core::strategy::Strategy;
use stratlab_runner::optimize::{optimize, OptimizationType, OptimizeOptions};
use stratlab_runner::{preset, Objective};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2020, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.07).sin() * 12.0;
            Bar::new(base + Duration::days(i as i64), close - 0.4, close + 1.2, close - 1.6, close)
        })
        .collect()
}

fn trailing_breakout() -> Strategy {
    let mut parameters = Parameters::new();
    parameters.insert("trail_pct".into(), 4.0);
    // presets only attach a trailing stop when the parameter exists
    preset("breakout", &parameters).unwrap()
}

fn defs() -> Vec<ParameterDef> {
    vec![
        ParameterDef::new("entry_window", 5.0, 50.0, 5.0),
        ParameterDef::new("exit_window", 5.0, 25.0, 5.0),
        ParameterDef::new("trail_pct", 2.0, 8.0, 2.0),
    ]
}

// ── 1. Grid ──────────────────────────────────────────────────────────

fn bench_grid(c: &mut Criterion) {
    let bars = make_bars(1000);
    let strategy = trailing_breakout();
    let objective = Objective::ProfitPct.into_fn(10_000.0);
    let mut group = c.benchmark_group("grid");
    group.sample_size(10);
    for parallel in [false, true] {
        let options = OptimizeOptions {
            parallel,
            ..OptimizeOptions::default()
        };
        let name = if parallel { "parallel" } else { "sequential" };
        group.bench_function(name, |b| {
            b.iter(|| optimize(black_box(&strategy), &defs(), &objective, black_box(&bars), &options))
        });
    }
    group.finish();
}

// ── 2. Hill climbing ─────────────────────────────────────────────────

fn bench_hill_climb(c: &mut Criterion) {
    let bars = make_bars(1000);
    let strategy = trailing_breakout();
    let objective = Objective::ProfitPct.into_fn(10_000.0);
    let options = OptimizeOptions {
        optimization_type: OptimizationType::HillClimb,
        num_starting_points: 8,
        random_seed: 1,
        ..OptimizeOptions::default()
    };
    c.bench_function("hill_climb_8_starts", |b| {
        b.iter(|| optimize(black_box(&strategy), &defs(), &objective, black_box(&bars), &options))
    });
}

criterion_group!(benches, bench_grid, bench_hill_climb);
criterion_main!(benches);
