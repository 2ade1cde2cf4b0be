//! Core data types: return series, history views, value series, and
//! rebalance schedules.

use crate::error::{PortfolioError, Result};
use crate::stats;
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Default tolerance for the sum-to-one check on weight vectors.
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Trading periods per year used for annualization.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// A time-ordered, gap-free table of periodic asset returns.
///
/// Rows are aligned to a fixed, ordered asset universe. Timestamps are strictly
/// increasing and every value is finite; [`ReturnSeries::new`] enforces this.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnSeries {
    assets: Vec<String>,
    timestamps: Vec<DateTime<Utc>>,
    rows: Vec<Vec<f64>>,
}

impl ReturnSeries {
    /// Build a validated return series.
    pub fn new(
        assets: Vec<String>,
        timestamps: Vec<DateTime<Utc>>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        validate_assets(&assets)?;
        if timestamps.len() != rows.len() {
            return Err(PortfolioError::invalid_input(format!(
                "{} timestamps for {} return rows",
                timestamps.len(),
                rows.len()
            )));
        }
        if let Some(w) = timestamps.windows(2).find(|w| w[1] <= w[0]) {
            return Err(PortfolioError::invalid_input(format!(
                "timestamps must be strictly increasing ({} follows {})",
                w[1], w[0]
            )));
        }
        for (ts, row) in timestamps.iter().zip(&rows) {
            if row.len() != assets.len() {
                return Err(PortfolioError::invalid_input(format!(
                    "row at {} has {} values, expected {}",
                    ts,
                    row.len(),
                    assets.len()
                )));
            }
            if row.iter().any(|r| !r.is_finite()) {
                return Err(PortfolioError::invalid_input(format!(
                    "row at {} contains a missing or non-finite return",
                    ts
                )));
            }
        }

        Ok(Self {
            assets,
            timestamps,
            rows,
        })
    }

    /// Derive period-over-period returns from a price table.
    ///
    /// Price rows with a missing (non-finite) value are dropped before
    /// differencing, so the first surviving row anchors the series and the
    /// returned table has one row fewer than the surviving prices.
    pub fn from_prices(
        assets: Vec<String>,
        timestamps: Vec<DateTime<Utc>>,
        prices: Vec<Vec<f64>>,
    ) -> Result<Self> {
        validate_assets(&assets)?;
        if timestamps.len() != prices.len() {
            return Err(PortfolioError::invalid_input(format!(
                "{} timestamps for {} price rows",
                timestamps.len(),
                prices.len()
            )));
        }

        let clean: Vec<(DateTime<Utc>, Vec<f64>)> = timestamps
            .into_iter()
            .zip(prices)
            .filter(|(_, row)| row.len() == assets.len() && row.iter().all(|p| p.is_finite()))
            .collect();

        if clean.len() < 2 {
            return Err(PortfolioError::invalid_input(
                "need at least two complete price rows to compute returns",
            ));
        }
        if let Some((ts, _)) = clean.iter().find(|(_, row)| row.iter().any(|&p| p <= 0.0)) {
            return Err(PortfolioError::invalid_input(format!(
                "non-positive price at {}",
                ts
            )));
        }

        let (timestamps, rows) = clean
            .windows(2)
            .map(|w| {
                let returns = w[0]
                    .1
                    .iter()
                    .zip(&w[1].1)
                    .map(|(prev, next)| next / prev - 1.0)
                    .collect::<Vec<f64>>();
                (w[1].0, returns)
            })
            .unzip();

        Self::new(assets, timestamps, rows)
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of an asset in the universe ordering.
    pub fn asset_index(&self, name: &str) -> Option<usize> {
        self.assets.iter().position(|a| a == name)
    }

    /// Borrowed view over the whole series.
    pub fn view(&self) -> ReturnView<'_> {
        ReturnView {
            assets: &self.assets,
            timestamps: &self.timestamps,
            rows: &self.rows,
        }
    }

    /// Borrowed view over rows `start..end`.
    pub fn window(&self, start: usize, end: usize) -> Result<ReturnView<'_>> {
        if start > end || end > self.len() {
            return Err(PortfolioError::invalid_input(format!(
                "window {}..{} out of range for {} periods",
                start,
                end,
                self.len()
            )));
        }
        Ok(ReturnView {
            assets: &self.assets,
            timestamps: &self.timestamps[start..end],
            rows: &self.rows[start..end],
        })
    }

    /// Borrowed view over all rows with `start <= timestamp <= end`.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> ReturnView<'_> {
        let lo = self.timestamps.partition_point(|t| *t < start);
        let hi = self.timestamps.partition_point(|t| *t <= end).max(lo);
        ReturnView {
            assets: &self.assets,
            timestamps: &self.timestamps[lo..hi],
            rows: &self.rows[lo..hi],
        }
    }
}

fn validate_assets(assets: &[String]) -> Result<()> {
    if assets.is_empty() {
        return Err(PortfolioError::invalid_input(
            "asset universe must not be empty",
        ));
    }
    let mut seen = HashSet::with_capacity(assets.len());
    if let Some(dup) = assets.iter().find(|a| !seen.insert(a.as_str())) {
        return Err(PortfolioError::invalid_input(format!(
            "duplicate asset name: {}",
            dup
        )));
    }
    Ok(())
}

/// A borrowed, contiguous slice of a [`ReturnSeries`].
///
/// Strategies receive history as a view so the simulator never copies the
/// return table per rebalance.
#[derive(Debug, Clone, Copy)]
pub struct ReturnView<'a> {
    assets: &'a [String],
    timestamps: &'a [DateTime<Utc>],
    rows: &'a [Vec<f64>],
}

impl<'a> ReturnView<'a> {
    pub fn assets(&self) -> &'a [String] {
        self.assets
    }

    pub fn num_assets(&self) -> usize {
        self.assets.len()
    }

    pub fn timestamps(&self) -> &'a [DateTime<Utc>] {
        self.timestamps
    }

    pub fn rows(&self) -> &'a [Vec<f64>] {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    /// The trailing `n` periods (or all of them when fewer are available).
    pub fn tail(&self, n: usize) -> ReturnView<'a> {
        let start = self.rows.len().saturating_sub(n);
        ReturnView {
            assets: self.assets,
            timestamps: &self.timestamps[start..],
            rows: &self.rows[start..],
        }
    }

    /// Return column for one asset.
    pub fn asset_returns(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[index]).collect()
    }

    /// Per-asset mean period return.
    pub fn mean_returns(&self) -> Vec<f64> {
        (0..self.num_assets())
            .map(|j| stats::mean(&self.asset_returns(j)))
            .collect()
    }

    /// Sample covariance matrix (n - 1 denominator).
    ///
    /// Fewer than two periods give an all-zero matrix.
    #[allow(clippy::needless_range_loop)]
    pub fn covariance(&self) -> Vec<Vec<f64>> {
        let n = self.num_assets();
        let mut cov = vec![vec![0.0; n]; n];
        if self.rows.len() < 2 {
            return cov;
        }

        let means = self.mean_returns();
        let denom = (self.rows.len() - 1) as f64;
        for i in 0..n {
            for j in i..n {
                let c = self
                    .rows
                    .iter()
                    .map(|row| (row[i] - means[i]) * (row[j] - means[j]))
                    .sum::<f64>()
                    / denom;
                cov[i][j] = c;
                cov[j][i] = c;
            }
        }
        cov
    }

    /// Per-period portfolio returns for a static weight vector.
    pub fn portfolio_returns(&self, weights: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.iter().zip(weights).map(|(r, w)| r * w).sum())
            .collect()
    }

    /// Compounded return of each asset over the whole view.
    pub fn cumulative_returns(&self) -> Vec<f64> {
        (0..self.num_assets())
            .map(|j| self.rows.iter().fold(1.0, |acc, row| acc * (1.0 + row[j])) - 1.0)
            .collect()
    }

    /// Copy the view into an owned series.
    pub fn to_series(&self) -> ReturnSeries {
        ReturnSeries {
            assets: self.assets.to_vec(),
            timestamps: self.timestamps.to_vec(),
            rows: self.rows.to_vec(),
        }
    }
}

/// One entry of a portfolio value series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuePoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Equal weighting over `n` assets.
pub fn equal_weights(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![1.0 / n as f64; n]
}

/// Check that `weights` has `n` finite entries summing to one within `tolerance`.
pub fn validate_weights(weights: &[f64], n: usize, tolerance: f64) -> Result<()> {
    if weights.len() != n {
        return Err(PortfolioError::invalid_weights(format!(
            "expected {} weights, got {}",
            n,
            weights.len()
        )));
    }
    if weights.iter().any(|w| !w.is_finite()) {
        return Err(PortfolioError::invalid_weights(
            "weights contain non-finite values",
        ));
    }
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() > tolerance {
        return Err(PortfolioError::invalid_weights(format!(
            "weights sum to {:.8}, expected 1",
            sum
        )));
    }
    Ok(())
}

/// Period boundary at which a strategy is re-invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RebalanceFrequency {
    /// Every period.
    Daily,
    /// Last period of each ISO week.
    Weekly,
    /// Last period of each calendar month.
    #[default]
    Monthly,
    /// Last period of each calendar quarter.
    Quarterly,
    /// Last period of each calendar year.
    Yearly,
    /// Only the initial allocation (buy and hold).
    Never,
}

impl RebalanceFrequency {
    fn bucket_key(&self, timestamp: DateTime<Utc>) -> i64 {
        match self {
            RebalanceFrequency::Daily => timestamp.timestamp().div_euclid(86_400),
            RebalanceFrequency::Weekly => {
                let week = timestamp.iso_week();
                week.year() as i64 * 100 + week.week() as i64
            }
            RebalanceFrequency::Monthly => {
                timestamp.year() as i64 * 12 + timestamp.month0() as i64
            }
            RebalanceFrequency::Quarterly => {
                timestamp.year() as i64 * 4 + (timestamp.month0() / 3) as i64
            }
            RebalanceFrequency::Yearly => timestamp.year() as i64,
            RebalanceFrequency::Never => 0,
        }
    }

    /// Mark the rebalance dates of a timestamp sequence.
    ///
    /// A timestamp is a rebalance date when it is the last one in its period
    /// bucket. The final timestamp only counts when its bucket closes on that
    /// calendar day, so a series ending mid-month is not rebalanced on its
    /// last row. `Never` marks nothing, and `Daily` marks the last timestamp of
    /// every calendar day (every period for daily data).
    pub fn schedule(&self, timestamps: &[DateTime<Utc>]) -> Vec<bool> {
        if *self == RebalanceFrequency::Never {
            return vec![false; timestamps.len()];
        }
        (0..timestamps.len())
            .map(|i| {
                let current = timestamps[i];
                match timestamps.get(i + 1) {
                    Some(next) => self.bucket_key(*next) != self.bucket_key(current),
                    None => self.closes_bucket(current),
                }
            })
            .collect()
    }

    /// Whether the calendar period containing `timestamp` ends on its day.
    fn closes_bucket(&self, timestamp: DateTime<Utc>) -> bool {
        match timestamp.checked_add_signed(Duration::days(1)) {
            Some(next_day) => self.bucket_key(next_day) != self.bucket_key(timestamp),
            None => true,
        }
    }
}
