//! StratLab CLI: backtest, optimize, walk-forward and Monte Carlo commands.
//!
//! Commands:
//! - `backtest`: run one strategy over a CSV bar file and report analytics
//! - `optimize`: grid or hill-climb search over parameter ranges
//! - `walk-forward`: sliding re-optimization with stitched out-of-sample trades
//! - `monte-carlo`: resample a backtest's trades and summarize the spread
//!
//! Every command can start from a TOML run config (`--config`); flags given
//! on the command line override the file.

mod obs;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::info;

use stratlab_core::analysis::{analyze, AnalysisReport};
use stratlab_core::domain::{Bar, ParameterDef, Trade};
use stratlab_core::engine::backtest;
use stratlab_runner::export::{report_markdown, to_json, trades_to_csv, write_file};
use stratlab_runner::{
    load_bars_csv, monte_carlo, optimize, summarize, walk_forward, Objective, OptimizationType,
    RunConfig, SearchDirection,
};

#[derive(Parser)]
#[command(
    name = "stratlab",
    version,
    about = "StratLab CLI: bar-by-bar strategy backtesting and parameter search"
)]
struct Cli {
    /// Log level or filter directive (overridden by STRATLAB_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format: text or json.
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest and print its analytics report.
    Backtest {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Search parameter ranges for the best objective value.
    Optimize {
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Re-optimize on sliding in-sample windows and replay out of sample.
    WalkForward {
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        search: SearchArgs,

        /// In-sample window length in bars.
        #[arg(long)]
        in_sample: Option<usize>,

        /// Out-of-sample window length in bars.
        #[arg(long)]
        out_sample: Option<usize>,
    },
    /// Resample a backtest's trades with replacement.
    MonteCarlo {
        #[command(flatten)]
        run: RunArgs,

        /// Number of synthetic trade sequences.
        #[arg(long)]
        iterations: Option<usize>,

        /// Trades per sequence.
        #[arg(long)]
        samples: Option<usize>,

        /// RNG seed.
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Markdown,
}

/// Options shared by every command.
#[derive(Args)]
struct RunArgs {
    /// Path to a TOML run config.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV bar file (overrides the config's `backtest.data`).
    #[arg(long)]
    data: Option<PathBuf>,

    /// Preset strategy: breakout, ma_cross, mean_reversion.
    #[arg(long)]
    preset: Option<String>,

    /// Strategy parameter as NAME=VALUE. Repeatable.
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, f64)>,

    /// Starting capital for analytics.
    #[arg(long)]
    capital: Option<f64>,

    /// Record stop-price and risk series on every trade.
    #[arg(long, default_value_t = false)]
    record: bool,

    /// Directory for trades.csv and the JSON result.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Report format on stdout.
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

/// Options for commands that run the optimizer.
#[derive(Args)]
struct SearchArgs {
    /// Parameter range as NAME=START:END:STEP. Repeatable; replaces the config's ranges.
    #[arg(long = "range", value_parser = parse_range)]
    ranges: Vec<ParameterDef>,

    /// Objective to optimize (e.g. profit-pct, system-quality).
    #[arg(long)]
    objective: Option<Objective>,

    /// Minimize instead of maximize.
    #[arg(long, default_value_t = false)]
    minimize: bool,

    /// Use hill-climbing with random restarts instead of a full grid.
    #[arg(long, default_value_t = false)]
    hill_climb: bool,

    /// Hill-climb restarts.
    #[arg(long)]
    starts: Option<usize>,

    /// Hill-climb RNG seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Evaluate grid coordinates in parallel.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Include every evaluated coordinate in the output.
    #[arg(long, default_value_t = false)]
    all_results: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    obs::init_tracing(&cli.log_level, &cli.log_format)?;

    match cli.command {
        Commands::Backtest { run } => run_backtest_cmd(&run),
        Commands::Optimize { run, search } => run_optimize_cmd(&run, &search),
        Commands::WalkForward {
            run,
            search,
            in_sample,
            out_sample,
        } => run_walk_forward_cmd(&run, &search, in_sample, out_sample),
        Commands::MonteCarlo {
            run,
            iterations,
            samples,
            seed,
        } => run_monte_carlo_cmd(&run, iterations, samples, seed),
    }
}

// ─── Config resolution ──────────────────────────────────────────────

fn resolve_config(run: &RunArgs) -> Result<RunConfig> {
    let mut config = match &run.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RunConfig::default(),
    };
    if let Some(data) = &run.data {
        config.backtest.data = Some(data.clone());
    }
    if let Some(preset) = &run.preset {
        config.strategy.preset = preset.clone();
    }
    for (name, value) in &run.params {
        config.strategy.parameters.insert(name.clone(), *value);
    }
    if let Some(capital) = run.capital {
        config.backtest.starting_capital = capital;
    }
    if run.record {
        config.backtest.record_stop_price = true;
        config.backtest.record_risk = true;
    }
    config.validate().context("invalid run configuration")?;
    Ok(config)
}

fn apply_search(config: &mut RunConfig, search: &SearchArgs) -> Result<()> {
    if !search.ranges.is_empty() {
        config.optimize.parameters = search.ranges.clone();
    }
    if let Some(objective) = search.objective {
        config.optimize.objective = objective;
    }
    if search.minimize {
        config.optimize.search_direction = Some(SearchDirection::Min);
    }
    if search.hill_climb {
        config.optimize.optimization_type = OptimizationType::HillClimb;
    }
    if let Some(starts) = search.starts {
        config.optimize.num_starting_points = starts;
    }
    if let Some(seed) = search.seed {
        config.optimize.random_seed = seed;
    }
    config.optimize.parallel |= search.parallel;
    config.optimize.record_all_results |= search.all_results;
    config.validate().context("invalid optimizer configuration")?;
    Ok(())
}

fn load_bars(config: &RunConfig) -> Result<Vec<Bar>> {
    let Some(path) = config.backtest.data.as_ref() else {
        bail!("no bar data: pass --data or set backtest.data in the config");
    };
    let bars = load_bars_csv(path).with_context(|| format!("failed to load bars from {}", path.display()))?;
    if bars.is_empty() {
        bail!("{} contains no bars", path.display());
    }
    Ok(bars)
}

// ─── Commands ───────────────────────────────────────────────────────

fn run_backtest_cmd(run: &RunArgs) -> Result<()> {
    let config = resolve_config(run)?;
    let bars = load_bars(&config)?;
    let strategy = config.build_strategy()?;

    let outcome = backtest(&strategy, &bars, &config.backtest_options());
    let report = analyze(config.backtest.starting_capital, &outcome.trades).with_retracement(&outcome.trades);
    info!(
        strategy = %strategy.name,
        bars = bars.len(),
        trades = outcome.trades.len(),
        "backtest finished"
    );

    let result = json!({
        "run_id": config.run_id()?,
        "strategy": strategy.name,
        "parameters": strategy.parameters,
        "final_status": outcome.final_status,
        "report": report,
    });
    emit(run, &strategy.name, &report, &result, &outcome.trades)
}

fn run_optimize_cmd(run: &RunArgs, search: &SearchArgs) -> Result<()> {
    let mut config = resolve_config(run)?;
    apply_search(&mut config, search)?;
    if config.optimize.parameters.is_empty() {
        bail!("nothing to optimize: pass --range NAME=START:END:STEP or add [[optimize.parameters]]");
    }
    let bars = load_bars(&config)?;
    let strategy = config.build_strategy()?;

    let result = optimize(
        &strategy,
        &config.optimize.parameters,
        config.objective_fn(),
        &bars,
        &config.optimize_options(),
    )?;

    let tuned = strategy.with_overrides(&result.best_parameters);
    let outcome = backtest(&tuned, &bars, &config.backtest_options());
    let report = analyze(config.backtest.starting_capital, &outcome.trades);

    let payload = json!({
        "run_id": config.run_id()?,
        "strategy": strategy.name,
        "objective": config.optimize.objective,
        "optimization": result,
        "report": report,
    });
    emit(run, &strategy.name, &report, &payload, &outcome.trades)
}

fn run_walk_forward_cmd(
    run: &RunArgs,
    search: &SearchArgs,
    in_sample: Option<usize>,
    out_sample: Option<usize>,
) -> Result<()> {
    let mut config = resolve_config(run)?;
    apply_search(&mut config, search)?;
    if let Some(size) = in_sample {
        config.walk_forward.in_sample_size = size;
    }
    if let Some(size) = out_sample {
        config.walk_forward.out_sample_size = size;
    }
    let bars = load_bars(&config)?;
    let strategy = config.build_strategy()?;

    let result = walk_forward(
        &strategy,
        &config.optimize.parameters,
        config.objective_fn(),
        &bars,
        config.walk_forward.in_sample_size,
        config.walk_forward.out_sample_size,
        &config.optimize_options(),
    )?;
    if result.windows.is_empty() {
        bail!(
            "{} bars cannot hold one {}+{} bar window",
            bars.len(),
            config.walk_forward.in_sample_size,
            config.walk_forward.out_sample_size
        );
    }
    let report = analyze(config.backtest.starting_capital, &result.trades);

    let payload = json!({
        "run_id": config.run_id()?,
        "strategy": strategy.name,
        "windows": result.windows,
        "report": report,
    });
    emit(run, &strategy.name, &report, &payload, &result.trades)
}

fn run_monte_carlo_cmd(
    run: &RunArgs,
    iterations: Option<usize>,
    samples: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let mut config = resolve_config(run)?;
    if let Some(n) = iterations {
        config.monte_carlo.num_iterations = n;
    }
    if let Some(n) = samples {
        config.monte_carlo.num_samples = n;
    }
    if let Some(seed) = seed {
        config.monte_carlo.random_seed = seed;
    }
    let bars = load_bars(&config)?;
    let strategy = config.build_strategy()?;

    let outcome = backtest(&strategy, &bars, &config.backtest_options());
    let report = analyze(config.backtest.starting_capital, &outcome.trades);
    let resampled = monte_carlo(&outcome.trades, &config.monte_carlo);
    let summary = summarize(&resampled, config.backtest.starting_capital);
    info!(source_trades = outcome.trades.len(), samples = summary.samples, "monte carlo finished");

    let payload = json!({
        "run_id": config.run_id()?,
        "strategy": strategy.name,
        "options": config.monte_carlo,
        "summary": summary,
        "report": report,
    });
    emit(run, &strategy.name, &report, &payload, &outcome.trades)
}

// ─── Output ─────────────────────────────────────────────────────────

fn emit(
    run: &RunArgs,
    title: &str,
    report: &AnalysisReport,
    payload: &serde_json::Value,
    trades: &[Trade],
) -> Result<()> {
    let json = to_json(payload)?;
    match run.format {
        OutputFormat::Json => println!("{json}"),
        OutputFormat::Markdown => print!("{}", report_markdown(title, report)),
    }
    if let Some(dir) = &run.output_dir {
        save_outputs(dir, &json, trades)?;
    }
    Ok(())
}

fn save_outputs(dir: &Path, json: &str, trades: &[Trade]) -> Result<()> {
    write_file(&dir.join("result.json"), json)?;
    write_file(&dir.join("trades.csv"), &trades_to_csv(trades)?)?;
    info!(dir = %dir.display(), "outputs saved");
    Ok(())
}

// ─── Argument parsers ───────────────────────────────────────────────

fn parse_param(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty parameter name in '{raw}'"));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    Ok((name.to_string(), value))
}

fn parse_range(raw: &str) -> Result<ParameterDef, String> {
    let (name, spec) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=START:END:STEP, got '{raw}'"))?;
    let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
    let [start, end, step] = parts.as_slice() else {
        return Err(format!("expected START:END:STEP, got '{spec}'"));
    };
    let number = |s: &str| s.parse::<f64>().map_err(|_| format!("'{s}' is not a number"));
    let def = ParameterDef::new(name.trim(), number(start)?, number(end)?, number(step)?);
    def.validate().map_err(|e| e.to_string())?;
    Ok(def)
}
