//! Backtest execution engine.
//!
//! The simulator walks a [`ReturnSeries`] one period at a time. At each
//! rebalance date (and on the first period) it asks the strategy for target
//! weights, charges turnover costs against the current value, applies the
//! period's portfolio return, and lets the weights drift with asset returns.

use crate::analytics::PerformanceMetrics;
use crate::error::{PortfolioError, Result};
use crate::linalg::dot;
use crate::strategy::AllocationStrategy;
use crate::types::{
    validate_weights, RebalanceFrequency, ReturnSeries, ValuePoint, WEIGHT_TOLERANCE,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration for the backtest engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Initial capital for the backtest.
    pub initial_capital: f64,
    /// Transaction cost as a fraction of traded value (turnover x value).
    pub cost_rate: f64,
    /// How often the strategy is re-invoked.
    pub rebalance: RebalanceFrequency,
    /// Allowed deviation of the weight sum from one.
    #[serde(default = "default_weight_tolerance")]
    pub weight_tolerance: f64,
}

fn default_weight_tolerance() -> f64 {
    WEIGHT_TOLERANCE
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 1_000_000.0,
            cost_rate: 0.001,
            rebalance: RebalanceFrequency::Monthly,
            weight_tolerance: WEIGHT_TOLERANCE,
        }
    }
}

impl BacktestConfig {
    /// Set the starting portfolio value.
    pub fn with_initial_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    /// Set the proportional cost charged on turnover.
    pub fn with_cost_rate(mut self, rate: f64) -> Self {
        self.cost_rate = rate;
        self
    }

    /// Set how often the strategy is asked for new weights.
    pub fn with_rebalance(mut self, frequency: RebalanceFrequency) -> Self {
        self.rebalance = frequency;
        self
    }

    /// Set the allowed deviation of a weight sum from one.
    pub fn with_weight_tolerance(mut self, tolerance: f64) -> Self {
        self.weight_tolerance = tolerance;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(PortfolioError::invalid_input(
                "initial capital must be positive",
            ));
        }
        if !(self.cost_rate.is_finite() && self.cost_rate >= 0.0) {
            return Err(PortfolioError::invalid_input(
                "cost rate must be non-negative",
            ));
        }
        if !(self.weight_tolerance.is_finite() && self.weight_tolerance >= 0.0) {
            return Err(PortfolioError::invalid_input(
                "weight tolerance must be non-negative",
            ));
        }
        Ok(())
    }
}

/// One strategy invocation recorded by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceEvent {
    /// Period on which the weights were set.
    pub timestamp: DateTime<Utc>,
    /// Target weights as returned by the strategy.
    pub weights: Vec<f64>,
    /// Sum of absolute weight changes against the drifted weights.
    pub turnover: f64,
    /// Cost deducted from portfolio value.
    pub cost: f64,
}

/// Results from a backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRun {
    /// Name reported by the strategy.
    pub strategy_name: String,
    /// Asset names, in weight order.
    pub assets: Vec<String>,
    /// Configuration the run used.
    pub config: BacktestConfig,
    /// Starting portfolio value.
    pub initial_capital: f64,
    /// Portfolio value after the last period.
    pub final_value: f64,
    /// Portfolio value after each period.
    pub values: Vec<ValuePoint>,
    /// Every rebalance, the initial allocation first.
    pub rebalances: Vec<RebalanceEvent>,
    /// Sum of all rebalance costs.
    pub total_costs: f64,
}

impl BacktestRun {
    /// Plain value series, one entry per period.
    pub fn value_series(&self) -> Vec<f64> {
        self.values.iter().map(|p| p.value).collect()
    }

    /// Performance metrics of the value series, anchored at initial capital.
    pub fn metrics(&self, risk_free_rate: f64) -> PerformanceMetrics {
        let values: Vec<f64> = std::iter::once(self.initial_capital)
            .chain(self.values.iter().map(|p| p.value))
            .collect();
        PerformanceMetrics::from_values(&values, risk_free_rate)
    }

    pub fn total_return(&self) -> f64 {
        self.final_value / self.initial_capital - 1.0
    }
}

/// Per-run simulator state threaded through the fold.
struct RunState {
    value: f64,
    weights: Option<Vec<f64>>,
    values: Vec<ValuePoint>,
    rebalances: Vec<RebalanceEvent>,
    total_costs: f64,
}

struct Period<'a> {
    index: usize,
    timestamp: DateTime<Utc>,
    returns: &'a [f64],
    rebalance: bool,
}

/// The backtest simulator.
#[derive(Debug, Clone, Default)]
pub struct Backtester {
    config: BacktestConfig,
}

impl Backtester {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Simulate `strategy` over every period of `series`.
    pub fn run<S>(&self, series: &ReturnSeries, strategy: &mut S) -> Result<BacktestRun>
    where
        S: AllocationStrategy + ?Sized,
    {
        self.config.validate()?;
        if series.is_empty() {
            return Err(PortfolioError::invalid_input("return series is empty"));
        }

        info!(
            "Running backtest: {} on {} assets ({} periods, rebalance {:?})",
            strategy.name(),
            series.num_assets(),
            series.len(),
            self.config.rebalance
        );

        strategy.init();
        let schedule = self.config.rebalance.schedule(series.timestamps());

        let initial = RunState {
            value: self.config.initial_capital,
            weights: None,
            values: Vec::with_capacity(series.len()),
            rebalances: Vec::new(),
            total_costs: 0.0,
        };

        let state = series
            .timestamps()
            .iter()
            .zip(series.rows())
            .zip(schedule)
            .enumerate()
            .try_fold(initial, |state, (index, ((&timestamp, returns), rebalance))| {
                self.step(
                    state,
                    &mut *strategy,
                    series,
                    Period {
                        index,
                        timestamp,
                        returns,
                        rebalance,
                    },
                )
            })?;

        info!(
            "Backtest complete: final value {:.2}, {} rebalances, costs {:.2}",
            state.value,
            state.rebalances.len(),
            state.total_costs
        );

        Ok(BacktestRun {
            strategy_name: strategy.name().to_string(),
            assets: series.assets().to_vec(),
            config: self.config.clone(),
            initial_capital: self.config.initial_capital,
            final_value: state.value,
            values: state.values,
            rebalances: state.rebalances,
            total_costs: state.total_costs,
        })
    }

    fn step<S>(
        &self,
        mut state: RunState,
        strategy: &mut S,
        series: &ReturnSeries,
        period: Period<'_>,
    ) -> Result<RunState>
    where
        S: AllocationStrategy + ?Sized,
    {
        let weights = match state.weights.take() {
            Some(current) if !period.rebalance => current,
            previous => {
                let history = series.window(0, period.index + 1)?;
                let target = strategy.allocate(&history, period.timestamp)?;
                validate_weights(&target, series.num_assets(), self.config.weight_tolerance)
                    .map_err(|e| match e {
                        PortfolioError::InvalidWeights(msg) => PortfolioError::InvalidWeights(
                            format!("{} at {}: {}", strategy.name(), period.timestamp, msg),
                        ),
                        other => other,
                    })?;

                let turnover = previous
                    .as_deref()
                    .map(|current| {
                        current
                            .iter()
                            .zip(&target)
                            .map(|(c, t)| (t - c).abs())
                            .sum::<f64>()
                    })
                    .unwrap_or(0.0);
                let cost = turnover * self.config.cost_rate * state.value;
                state.value -= cost;
                state.total_costs += cost;

                debug!(
                    "Rebalance at {}: turnover {:.4}, cost {:.2}",
                    period.timestamp, turnover, cost
                );
                state.rebalances.push(RebalanceEvent {
                    timestamp: period.timestamp,
                    weights: target.clone(),
                    turnover,
                    cost,
                });
                target
            }
        };

        let growth = dot(&weights, period.returns);
        state.value = (state.value * (1.0 + growth)).max(0.0);
        state.values.push(ValuePoint {
            timestamp: period.timestamp,
            value: state.value,
        });

        let drifted: Vec<f64> = weights
            .iter()
            .zip(period.returns)
            .map(|(w, r)| w * (1.0 + r))
            .collect();
        let total: f64 = drifted.iter().sum();
        state.weights = Some(if total > 0.0 {
            drifted.into_iter().map(|w| w / total).collect()
        } else {
            weights
        });

        Ok(state)
    }
}
