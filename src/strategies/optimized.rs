//! Optimizer-backed allocation strategies.
//!
//! Both strategies estimate annualized moments from trailing history
//! (mean x 252, covariance x 252) and solve for long-only weights.

use crate::error::Result;
use crate::linalg;
use crate::optimizer::{black_litterman, optimize_with, Objective, OptimizerSettings, ViewSet};
use crate::strategy::AllocationStrategy;
use crate::types::{equal_weights, ReturnView, PERIODS_PER_YEAR};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Annualized mean returns and covariance of a history window.
fn annualized_moments(window: &ReturnView<'_>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let mu = window
        .mean_returns()
        .into_iter()
        .map(|m| m * PERIODS_PER_YEAR)
        .collect();
    let cov = linalg::scale(&window.covariance(), PERIODS_PER_YEAR);
    (mu, cov)
}

/// Re-optimizes weights on trailing history at every rebalance.
///
/// # Parameters
/// - `objective`: optimization objective
/// - `lookback`: trailing periods used for estimation (None = all history)
/// - `risk_free_rate`: annual rate for the Sharpe objective
/// - `min_history`: periods required before optimizing; equal weights until then
#[derive(Debug, Clone)]
pub struct OptimizedAllocation {
    objective: Objective,
    lookback: Option<usize>,
    risk_free_rate: f64,
    min_history: usize,
    settings: OptimizerSettings,
}

impl OptimizedAllocation {
    pub fn new(objective: Objective) -> Self {
        Self {
            objective,
            lookback: None,
            risk_free_rate: 0.0,
            min_history: 20,
            settings: OptimizerSettings::default(),
        }
    }

    pub fn with_lookback(mut self, periods: usize) -> Self {
        self.lookback = Some(periods);
        self
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    pub fn with_min_history(mut self, periods: usize) -> Self {
        self.min_history = periods.max(2);
        self
    }

    pub fn with_settings(mut self, settings: OptimizerSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl AllocationStrategy for OptimizedAllocation {
    fn name(&self) -> &str {
        self.objective.name()
    }

    fn allocate(&mut self, history: &ReturnView<'_>, as_of: DateTime<Utc>) -> Result<Vec<f64>> {
        let window = match self.lookback {
            Some(n) => history.tail(n),
            None => *history,
        };
        if window.len() < self.min_history {
            debug!(
                "{} periods of history at {}, holding equal weights",
                window.len(),
                as_of
            );
            return Ok(equal_weights(history.num_assets()));
        }

        let (mu, cov) = annualized_moments(&window);
        optimize_with(&mu, &cov, self.risk_free_rate, self.objective, &self.settings)
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![
            ("objective".to_string(), self.objective.name().to_string()),
            (
                "lookback".to_string(),
                self.lookback
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "all".to_string()),
            ),
            ("risk_free_rate".to_string(), self.risk_free_rate.to_string()),
        ]
    }
}

/// Optimizes on Black-Litterman posterior returns instead of sample means.
#[derive(Debug, Clone)]
pub struct BlackLittermanAllocation {
    market_weights: Vec<f64>,
    views: ViewSet,
    risk_aversion: f64,
    tau: f64,
    objective: Objective,
    lookback: Option<usize>,
    risk_free_rate: f64,
    settings: OptimizerSettings,
}

impl BlackLittermanAllocation {
    pub fn new(market_weights: Vec<f64>, views: ViewSet) -> Self {
        Self {
            market_weights,
            views,
            risk_aversion: 2.5,
            tau: 0.05,
            objective: Objective::MaxSharpe,
            lookback: None,
            risk_free_rate: 0.0,
            settings: OptimizerSettings::default(),
        }
    }

    pub fn with_risk_aversion(mut self, delta: f64) -> Self {
        self.risk_aversion = delta;
        self
    }

    pub fn with_tau(mut self, tau: f64) -> Self {
        self.tau = tau;
        self
    }

    pub fn with_objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }

    pub fn with_lookback(mut self, periods: usize) -> Self {
        self.lookback = Some(periods);
        self
    }

    pub fn with_risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }
}

impl AllocationStrategy for BlackLittermanAllocation {
    fn name(&self) -> &str {
        "Black-Litterman"
    }

    fn allocate(&mut self, history: &ReturnView<'_>, as_of: DateTime<Utc>) -> Result<Vec<f64>> {
        let window = match self.lookback {
            Some(n) => history.tail(n),
            None => *history,
        };
        if window.len() < 2 {
            warn!("Not enough history at {} for Black-Litterman, holding market weights", as_of);
            return Ok(self.market_weights.clone());
        }

        let (_, cov) = annualized_moments(&window);
        let posterior = black_litterman(
            &self.market_weights,
            &cov,
            self.risk_aversion,
            &self.views,
            self.tau,
        )?;
        optimize_with(&posterior, &cov, self.risk_free_rate, self.objective, &self.settings)
    }
}
