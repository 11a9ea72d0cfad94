//! Bar loading from local CSV files.
//!
//! Expected header: `time` (or `date`), `open`, `high`, `low`, `close`, and
//! optionally `volume`. Every other column is treated as a pre-computed
//! indicator and stored on the bar as a named value; an empty cell leaves
//! that value absent for the row. Rows are returned sorted by time.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, warn};

use stratlab_core::domain::Bar;

const TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("line {line}: cannot parse time '{value}'")]
    BadTime { line: usize, value: String },

    #[error("line {line}: column '{column}' is not a number: '{value}'")]
    BadNumber {
        line: usize,
        column: String,
        value: String,
    },
}

/// Load bars from a CSV file on disk.
pub fn load_bars_csv(path: impl AsRef<Path>) -> Result<Vec<Bar>, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bars = read_bars(file)?;
    debug!(path = %path.display(), bars = bars.len(), "loaded bars");
    Ok(bars)
}

/// Column positions resolved from the header row.
struct Layout {
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
    values: Vec<(usize, String)>,
}

impl Layout {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, LoadError> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let find = |name: &str| names.iter().position(|h| h == name);
        let require = |name: &'static str| find(name).ok_or(LoadError::MissingColumn(name));

        let time = find("time")
            .or_else(|| find("date"))
            .ok_or(LoadError::MissingColumn("time"))?;
        let open = require("open")?;
        let high = require("high")?;
        let low = require("low")?;
        let close = require("close")?;
        let volume = find("volume");

        let reserved = [Some(time), Some(open), Some(high), Some(low), Some(close), volume];
        let values = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !reserved.contains(&Some(*i)))
            .map(|(i, name)| (i, name.trim().to_string()))
            .collect();

        Ok(Self {
            time,
            open,
            high,
            low,
            close,
            volume,
            values,
        })
    }
}

/// Parse bars from any CSV source.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>, LoadError> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = csv.headers()?.clone();
    let layout = Layout::from_headers(&headers)?;

    let mut bars = Vec::new();
    for (index, record) in csv.records().enumerate() {
        let record = record?;
        // header is line 1
        let line = index + 2;
        let field = |i: usize| record.get(i).unwrap_or("");
        let number = |i: usize| parse_number(field(i), line, headers.get(i).unwrap_or(""));

        let time = parse_time(field(layout.time)).ok_or_else(|| LoadError::BadTime {
            line,
            value: field(layout.time).to_string(),
        })?;
        let mut bar = Bar::new(
            time,
            number(layout.open)?,
            number(layout.high)?,
            number(layout.low)?,
            number(layout.close)?,
        );
        if let Some(volume) = layout.volume {
            if !field(volume).is_empty() {
                bar = bar.with_volume(number(volume)?);
            }
        }
        for (i, name) in &layout.values {
            if !field(*i).is_empty() {
                bar = bar.with_value(name.clone(), number(*i)?);
            }
        }
        if !bar.is_sane() {
            warn!(line, time = %bar.time, "bar has inconsistent OHLC values");
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.time);
    Ok(bars)
}

fn parse_number(raw: &str, line: usize, column: &str) -> Result<f64, LoadError> {
    raw.parse::<f64>().map_err(|_| LoadError::BadNumber {
        line,
        column: column.to_string(),
        value: raw.to_string(),
    })
}

fn parse_time(raw: &str) -> Option<NaiveDateTime> {
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
