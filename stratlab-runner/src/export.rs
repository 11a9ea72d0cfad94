//! Reporting and export: JSON, CSV trade tape and a Markdown summary.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use stratlab_core::analysis::AnalysisReport;
use stratlab_core::domain::Trade;

// ─── JSON ───────────────────────────────────────────────────────────

/// Pretty JSON for any report or result value.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("failed to serialize to JSON")
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Export a trade list as CSV.
///
/// Columns: direction, entry_time, entry_price, exit_time, exit_price,
/// profit, profit_pct, growth, risk_pct, r_multiple, holding_period,
/// exit_reason, stop_price, profit_target. Absent optional values are empty.
pub fn trades_to_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "direction",
        "entry_time",
        "entry_price",
        "exit_time",
        "exit_price",
        "profit",
        "profit_pct",
        "growth",
        "risk_pct",
        "r_multiple",
        "holding_period",
        "exit_reason",
        "stop_price",
        "profit_target",
    ])?;

    let optional = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
    for t in trades {
        wtr.write_record([
            format!("{:?}", t.direction).to_lowercase(),
            t.entry_time.to_string(),
            format!("{:.6}", t.entry_price),
            t.exit_time.to_string(),
            format!("{:.6}", t.exit_price),
            format!("{:.6}", t.profit),
            format!("{:.4}", t.profit_pct),
            format!("{:.6}", t.growth),
            optional(t.risk_pct),
            format!("{:.4}", t.r_multiple),
            t.holding_period.to_string(),
            t.exit_reason.as_str().to_string(),
            optional(t.stop_price),
            optional(t.profit_target),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Markdown ───────────────────────────────────────────────────────

/// Human-readable summary of an analysis report.
pub fn report_markdown(title: &str, report: &AnalysisReport) -> String {
    let mut md = String::with_capacity(1024);
    md.push_str(&format!("# {title}\n\n"));
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");

    let rows: [(&str, String); 12] = [
        ("Starting capital", format!("{:.2}", report.starting_capital)),
        ("Final capital", format!("{:.2}", report.final_capital)),
        ("Profit", format!("{:.2} ({:.2}%)", report.profit, report.profit_pct)),
        ("Trades", report.total_trades.to_string()),
        ("Bars in trades", report.bar_count.to_string()),
        ("Win rate", format!("{:.1}%", report.percent_profitable)),
        (
            "Max drawdown",
            format!("{:.2} ({:.2}%)", report.max_drawdown, report.max_drawdown_pct),
        ),
        ("Expectancy (R)", format!("{:.3}", report.expectancy)),
        ("System quality", format!("{:.3}", report.system_quality)),
        ("Profit factor", format!("{:.3}", report.profit_factor)),
        ("Return on account", format!("{:.3}", report.return_on_account)),
        ("Expected value", format!("{:.3}", report.expected_value)),
    ];
    for (metric, value) in rows {
        md.push_str(&format!("| {metric} | {value} |\n"));
    }
    if let Some(risk) = report.max_risk_pct {
        md.push_str(&format!("| Max risk | {risk:.2}% |\n"));
    }
    if let Some(retracement) = report.max_retracement_pct {
        md.push_str(&format!("| Max retracement | {retracement:.2}% |\n"));
    }
    md
}

// ─── Files ──────────────────────────────────────────────────────────

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use stratlab_core::analysis::analyze;
    use stratlab_core::domain::{Position, TradeDirection, ExitReason};

    fn sample_trade() -> Trade {
        let entry = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let exit = NaiveDate::from_ymd_opt(2024, 1, 9)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Position::new(TradeDirection::Long, entry, 100.0).close(exit, 110.0, ExitReason::ExitRule)
    }

    #[test]
    fn csv_trades_header_and_row() {
        let csv = trades_to_csv(&[sample_trade()]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("direction,entry_time,entry_price"));
        assert_eq!(lines[0].split(',').count(), 14);
        assert!(lines[1].starts_with("long,2024-01-02 00:00:00,100.000000"));
        assert!(lines[1].contains("exit-rule"));
    }

    #[test]
    fn csv_empty_trades() {
        let csv = trades_to_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn json_contains_report_fields() {
        let json = to_json(&analyze(1000.0, &[sample_trade()])).unwrap();
        assert!(json.contains("\"final_capital\""));
        assert!(json.contains("\"max_retracement_pct\": null"));
    }

    #[test]
    fn markdown_has_table() {
        let md = report_markdown("Run", &analyze(1000.0, &[sample_trade()]));
        assert!(md.starts_with("# Run\n"));
        assert!(md.contains("| Final capital | 1100.00 |"));
        assert!(!md.contains("Max retracement"));
    }

    #[test]
    fn write_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/trades.csv");
        write_file(&path, "x").unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x");
    }
}
