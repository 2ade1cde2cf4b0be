//! Price table loading.
//!
//! A price CSV has a date column followed by one column per asset:
//!
//! ```text
//! date,equities,bonds,gold
//! 2024-01-02,471.20,98.10,190.05
//! 2024-01-03,468.80,,190.40
//! ```
//!
//! Empty or unparseable price cells are read as missing; those rows are
//! dropped when the table is converted to returns.

use crate::error::{PortfolioError, Result};
use crate::types::ReturnSeries;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{info, warn};

/// A date-indexed table of asset prices as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    pub assets: Vec<String>,
    pub timestamps: Vec<DateTime<Utc>>,
    /// One row per timestamp; missing prices are `NaN`.
    pub prices: Vec<Vec<f64>>,
}

impl PriceTable {
    /// Convert to a gap-free return series.
    pub fn into_returns(self) -> Result<ReturnSeries> {
        ReturnSeries::from_prices(self.assets, self.timestamps, self.prices)
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    for fmt in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            if let Some(dt) = d.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&dt));
            }
        }
    }

    Err(PortfolioError::invalid_input(format!(
        "Could not parse date: '{}'",
        s
    )))
}

/// Load a wide price table (date column + one column per asset) from CSV.
pub fn load_prices_csv(path: impl AsRef<Path>) -> Result<PriceTable> {
    let path = path.as_ref();
    info!("Loading prices from: {}", path.display());

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(PortfolioError::invalid_input(
            "price file needs a date column and at least one asset column",
        ));
    }
    let assets: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut rows: Vec<(DateTime<Utc>, Vec<f64>)> = Vec::new();
    let mut missing = 0usize;
    for record in reader.records() {
        let record = record?;
        let timestamp = parse_datetime(record.get(0).unwrap_or_default())?;
        let prices: Vec<f64> = (1..=assets.len())
            .map(|i| {
                record
                    .get(i)
                    .and_then(|cell| cell.parse::<f64>().ok())
                    .unwrap_or(f64::NAN)
            })
            .collect();
        if prices.iter().any(|p| p.is_nan()) {
            missing += 1;
        }
        rows.push((timestamp, prices));
    }

    if rows.is_empty() {
        return Err(PortfolioError::invalid_input(format!(
            "no price rows in {}",
            path.display()
        )));
    }
    if missing > 0 {
        warn!("{} rows have missing prices and will be dropped", missing);
    }

    rows.sort_by_key(|(ts, _)| *ts);
    let original_len = rows.len();
    rows.dedup_by_key(|(ts, _)| *ts);
    if rows.len() < original_len {
        warn!("Removed {} duplicate timestamps", original_len - rows.len());
    }

    info!(
        "Loaded {} price rows for {} assets",
        rows.len(),
        assets.len()
    );

    let (timestamps, prices) = rows.into_iter().unzip();
    Ok(PriceTable {
        assets,
        timestamps,
        prices,
    })
}

/// Load a price CSV and convert it straight to returns.
pub fn load_returns_csv(path: impl AsRef<Path>) -> Result<ReturnSeries> {
    load_prices_csv(path)?.into_returns()
}
