//! Walk-forward out-of-sample evaluation.
//!
//! The series is cut into consecutive train/test windows. For window `i` the
//! strategy sees the `train_periods` rows starting at `i * test_periods`, and
//! the weights it returns are held static over the following `test_periods`
//! rows. Windows advance by `test_periods`, so test segments never overlap.

use crate::error::{PortfolioError, Result};
use crate::stats::{mean, ratio_or_zero, sample_std};
use crate::strategy::AllocationStrategy;
use crate::types::{validate_weights, ReturnSeries, PERIODS_PER_YEAR, WEIGHT_TOLERANCE};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Configuration for walk-forward analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Rows handed to the strategy per window.
    pub train_periods: usize,
    /// Rows over which the resulting weights are evaluated.
    pub test_periods: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_periods: 252,
            test_periods: 63,
        }
    }
}

impl WalkForwardConfig {
    pub fn new(train_periods: usize, test_periods: usize) -> Self {
        Self {
            train_periods,
            test_periods,
        }
    }

    /// Number of complete windows that fit in `total` periods.
    pub fn window_count(&self, total: usize) -> usize {
        if self.test_periods == 0 || total < self.train_periods {
            return 0;
        }
        (total - self.train_periods) / self.test_periods
    }
}

/// Row bounds of a single walk-forward window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardWindow {
    /// Window index.
    pub index: usize,
    /// First training row (inclusive).
    pub train_start: usize,
    /// Last training row (exclusive); also the first test row.
    pub train_end: usize,
    /// Last test row (exclusive).
    pub test_end: usize,
    /// Timestamp the weights were chosen at.
    pub as_of: DateTime<Utc>,
    pub test_start_time: DateTime<Utc>,
    pub test_end_time: DateTime<Utc>,
}

/// Out-of-sample outcome of one window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowResult {
    pub window: WalkForwardWindow,
    pub weights: Vec<f64>,
    /// Sum of per-period portfolio returns over the test rows.
    pub total_return: f64,
    /// Compounded portfolio return over the test rows.
    pub compounded_return: f64,
    /// Annualized Sharpe ratio of the test rows (0.0 when undefined).
    pub sharpe: f64,
}

/// Complete walk-forward analysis results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub config: WalkForwardConfig,
    pub windows: Vec<WindowResult>,
    /// Average of window total returns.
    pub avg_return: f64,
    /// Average of window compounded returns.
    pub avg_compounded_return: f64,
    /// Average of window Sharpe ratios.
    pub avg_sharpe: f64,
    /// Fraction of windows with a positive total return.
    pub positive_ratio: f64,
}

impl WalkForwardResult {
    fn from_windows(config: WalkForwardConfig, windows: Vec<WindowResult>) -> Self {
        let returns: Vec<f64> = windows.iter().map(|w| w.total_return).collect();
        let compounded: Vec<f64> = windows.iter().map(|w| w.compounded_return).collect();
        let sharpes: Vec<f64> = windows.iter().map(|w| w.sharpe).collect();
        let positive_ratio = if windows.is_empty() {
            0.0
        } else {
            returns.iter().filter(|&&r| r > 0.0).count() as f64 / windows.len() as f64
        };

        Self {
            config,
            avg_return: mean(&returns),
            avg_compounded_return: mean(&compounded),
            avg_sharpe: mean(&sharpes),
            positive_ratio,
            windows,
        }
    }

    /// Get a summary of the walk-forward analysis.
    pub fn summary(&self) -> String {
        format!(
            "Walk-Forward Analysis Summary:\n\
             Windows: {} (train {}, test {})\n\
             Avg Return: {:.2}%\n\
             Avg Compounded Return: {:.2}%\n\
             Avg Sharpe: {:.2}\n\
             Positive Windows: {:.1}%",
            self.windows.len(),
            self.config.train_periods,
            self.config.test_periods,
            self.avg_return * 100.0,
            self.avg_compounded_return * 100.0,
            self.avg_sharpe,
            self.positive_ratio * 100.0
        )
    }

    /// Positive average out-of-sample return in at least `min_positive_ratio`
    /// of the windows.
    pub fn is_robust(&self, min_positive_ratio: f64) -> bool {
        !self.windows.is_empty()
            && self.avg_return > 0.0
            && self.positive_ratio >= min_positive_ratio
    }
}

/// Walk-forward analyzer.
#[derive(Debug, Clone, Default)]
pub struct WalkForwardAnalyzer {
    config: WalkForwardConfig,
}

impl WalkForwardAnalyzer {
    pub fn new(config: WalkForwardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WalkForwardConfig {
        &self.config
    }

    /// Calculate window boundaries for the series.
    ///
    /// Returns an empty list when the series is shorter than one window.
    pub fn calculate_windows(&self, series: &ReturnSeries) -> Result<Vec<WalkForwardWindow>> {
        if self.config.train_periods == 0 || self.config.test_periods == 0 {
            return Err(PortfolioError::invalid_input(
                "train and test periods must be positive",
            ));
        }

        let count = self.config.window_count(series.len());
        if count == 0 {
            warn!(
                "Series of {} periods is too short for train {} / test {}",
                series.len(),
                self.config.train_periods,
                self.config.test_periods
            );
        }

        let timestamps = series.timestamps();
        Ok((0..count)
            .map(|i| {
                let train_start = i * self.config.test_periods;
                let train_end = train_start + self.config.train_periods;
                let test_end = train_end + self.config.test_periods;
                WalkForwardWindow {
                    index: i,
                    train_start,
                    train_end,
                    test_end,
                    as_of: timestamps[train_end - 1],
                    test_start_time: timestamps[train_end],
                    test_end_time: timestamps[test_end - 1],
                }
            })
            .collect())
    }

    /// Evaluate `strategy` on every window in order.
    pub fn run<S>(&self, series: &ReturnSeries, strategy: &mut S) -> Result<WalkForwardResult>
    where
        S: AllocationStrategy + ?Sized,
    {
        let windows = self.calculate_windows(series)?;
        info!(
            "Running walk-forward analysis: {} with {} windows",
            strategy.name(),
            windows.len()
        );

        strategy.init();
        let results = windows
            .into_iter()
            .map(|window| evaluate_window(series, window, &mut *strategy))
            .collect::<Result<Vec<_>>>()?;

        Ok(WalkForwardResult::from_windows(self.config.clone(), results))
    }

    /// Evaluate windows concurrently, building a fresh strategy per window.
    pub fn run_parallel<F, S>(&self, series: &ReturnSeries, factory: F) -> Result<WalkForwardResult>
    where
        F: Fn() -> S + Sync,
        S: AllocationStrategy,
    {
        let windows = self.calculate_windows(series)?;
        info!(
            "Running parallel walk-forward analysis with {} windows",
            windows.len()
        );

        let results = windows
            .into_par_iter()
            .map(|window| {
                let mut strategy = factory();
                strategy.init();
                evaluate_window(series, window, &mut strategy)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(WalkForwardResult::from_windows(self.config.clone(), results))
    }
}

fn evaluate_window<S>(
    series: &ReturnSeries,
    window: WalkForwardWindow,
    strategy: &mut S,
) -> Result<WindowResult>
where
    S: AllocationStrategy + ?Sized,
{
    let train = series.window(window.train_start, window.train_end)?;
    let weights = strategy.allocate(&train, window.as_of)?;
    validate_weights(&weights, series.num_assets(), WEIGHT_TOLERANCE)?;

    let test = series.window(window.train_end, window.test_end)?;
    let returns = test.portfolio_returns(&weights);
    let total_return: f64 = returns.iter().sum();
    let compounded_return = returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;
    let sharpe = ratio_or_zero(mean(&returns), sample_std(&returns)) * PERIODS_PER_YEAR.sqrt();

    debug!(
        "Window {}: return {:.4}, sharpe {:.2}",
        window.index, total_return, sharpe
    );

    Ok(WindowResult {
        window,
        weights,
        total_return,
        compounded_return,
        sharpe,
    })
}
