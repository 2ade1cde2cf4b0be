//! Value-at-Risk, Conditional VaR, and Monte Carlo portfolio projection.
//!
//! All risk figures are reported as positive loss magnitudes: a VaR of 0.02
//! means a 2% loss at the chosen confidence level.
//!
//! # Example
//!
//! ```
//! use pathwise::risk::{calculate_cvar, calculate_var, VarMethod};
//!
//! let returns = vec![-0.03, -0.01, 0.0, 0.01, 0.02, 0.015, -0.005, 0.007];
//! let var = calculate_var(&returns, 0.95, &VarMethod::Historical).unwrap();
//! let cvar = calculate_cvar(&returns, 0.95).unwrap();
//! assert!(cvar >= var);
//! ```

use crate::error::{PortfolioError, Result};
use crate::linalg::{self, dot};
use crate::stats::{mean, percentile, population_std, ratio_or_zero, sample_std};
use crate::types::{validate_weights, ReturnView, WEIGHT_TOLERANCE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal as NormalCdf};
use tracing::{debug, info};

/// Default sample count for Monte Carlo VaR.
pub const DEFAULT_VAR_SAMPLES: usize = 100_000;

/// How VaR is estimated from a return sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VarMethod {
    /// Empirical percentile of the observed returns.
    Historical,
    /// Gaussian quantile from the sample mean and standard deviation.
    Parametric,
    /// Empirical percentile of a normal sample fitted to the returns.
    MonteCarlo { samples: usize, seed: Option<u64> },
}

impl VarMethod {
    /// Monte Carlo with the default sample count and an unseeded RNG.
    pub fn monte_carlo() -> Self {
        VarMethod::MonteCarlo {
            samples: DEFAULT_VAR_SAMPLES,
            seed: None,
        }
    }

    pub fn monte_carlo_seeded(seed: u64) -> Self {
        VarMethod::MonteCarlo {
            samples: DEFAULT_VAR_SAMPLES,
            seed: Some(seed),
        }
    }
}

fn check_sample(returns: &[f64], confidence: f64) -> Result<()> {
    if returns.is_empty() {
        return Err(PortfolioError::invalid_input("return sample is empty"));
    }
    if returns.iter().any(|r| !r.is_finite()) {
        return Err(PortfolioError::invalid_input(
            "return sample contains non-finite values",
        ));
    }
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(PortfolioError::invalid_input(format!(
            "confidence must lie in (0, 1), got {}",
            confidence
        )));
    }
    Ok(())
}

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Inverse standard normal CDF.
fn normal_quantile(p: f64) -> Result<f64> {
    let standard = NormalCdf::new(0.0, 1.0)
        .map_err(|e| PortfolioError::invalid_input(format!("normal distribution: {}", e)))?;
    Ok(standard.inverse_cdf(p))
}

fn historical_var(returns: &[f64], confidence: f64) -> f64 {
    -percentile(returns, 1.0 - confidence)
}

/// Value-at-Risk of a return sample at `confidence`.
pub fn calculate_var(returns: &[f64], confidence: f64, method: &VarMethod) -> Result<f64> {
    check_sample(returns, confidence)?;

    match *method {
        VarMethod::Historical => Ok(historical_var(returns, confidence)),
        VarMethod::Parametric => {
            let sigma = sample_std(returns).ok_or_else(|| {
                PortfolioError::invalid_input("parametric VaR needs at least two observations")
            })?;
            let z = normal_quantile(1.0 - confidence)?;
            Ok(-(mean(returns) + z * sigma))
        }
        VarMethod::MonteCarlo { samples, seed } => {
            if samples == 0 {
                return Err(PortfolioError::invalid_input(
                    "Monte Carlo VaR needs at least one sample",
                ));
            }
            let sigma = sample_std(returns).ok_or_else(|| {
                PortfolioError::invalid_input("Monte Carlo VaR needs at least two observations")
            })?;
            let normal = Normal::new(mean(returns), sigma)
                .map_err(|e| PortfolioError::invalid_input(format!("normal distribution: {}", e)))?;
            let mut rng = rng_from(seed);
            let simulated: Vec<f64> = (0..samples).map(|_| normal.sample(&mut rng)).collect();
            Ok(historical_var(&simulated, confidence))
        }
    }
}

/// Conditional VaR (expected shortfall): mean loss of the observations at or
/// below the historical VaR threshold.
pub fn calculate_cvar(returns: &[f64], confidence: f64) -> Result<f64> {
    check_sample(returns, confidence)?;
    Ok(cvar_unchecked(returns, confidence))
}

fn cvar_unchecked(returns: &[f64], confidence: f64) -> f64 {
    let var = historical_var(returns, confidence);
    let tail: Vec<f64> = returns.iter().copied().filter(|&r| r <= -var).collect();
    if tail.is_empty() {
        var
    } else {
        -mean(&tail)
    }
}

/// Configuration for [`monte_carlo_portfolio`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Number of simulated outcomes.
    pub num_simulations: usize,
    /// Projection horizon in periods.
    pub horizon_days: usize,
    /// Confidence level for VaR/CVaR (e.g., 0.95).
    pub confidence_level: f64,
    /// Random seed for reproducibility (None for random).
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            num_simulations: 10_000,
            horizon_days: 252,
            confidence_level: 0.95,
            seed: None,
        }
    }
}

impl MonteCarloConfig {
    /// Set the number of simulated outcomes.
    pub fn with_simulations(mut self, n: usize) -> Self {
        self.num_simulations = n;
        self
    }

    /// Set the projection horizon in periods.
    pub fn with_horizon(mut self, periods: usize) -> Self {
        self.horizon_days = periods;
        self
    }

    /// Set the VaR/CVaR confidence level, clamped to [0.5, 0.999].
    pub fn with_confidence(mut self, level: f64) -> Self {
        self.confidence_level = level.clamp(0.5, 0.999);
        self
    }

    /// Fix the base seed so runs are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Distribution summary of simulated horizon returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSimulation {
    pub num_simulations: usize,
    pub horizon_days: usize,
    pub confidence_level: f64,
    /// Mean simulated horizon return.
    pub expected_return: f64,
    /// Population standard deviation of simulated horizon returns.
    pub volatility: f64,
    pub var: f64,
    pub cvar: f64,
    /// Fraction of outcomes below zero.
    pub prob_loss: f64,
    /// `expected_return / volatility`, 0.0 when volatility is zero.
    pub sharpe: f64,
}

impl PortfolioSimulation {
    pub fn summary(&self) -> String {
        format!(
            r#"Monte Carlo Portfolio Projection
================================
Simulations: {}
Horizon: {} periods

Expected Return: {:.2}%
Volatility: {:.2}%
VaR ({}%): {:.2}%
CVaR: {:.2}%
P(Loss): {:.1}%
Sharpe: {:.2}"#,
            self.num_simulations,
            self.horizon_days,
            self.expected_return * 100.0,
            self.volatility * 100.0,
            (self.confidence_level * 100.0).round() as i32,
            self.var * 100.0,
            self.cvar * 100.0,
            self.prob_loss * 100.0,
            self.sharpe
        )
    }
}

/// Project horizon outcomes of a weighted portfolio.
///
/// Each trial draws one vector from `MVN(μ·h, Σ·h)`, with `μ` and `Σ`
/// estimated from `returns` and periods assumed i.i.d., and projects it
/// through `weights`. Trials run in parallel; every trial owns an RNG derived
/// from the base seed, so seeded results do not depend on the thread count.
pub fn monte_carlo_portfolio(
    weights: &[f64],
    returns: &ReturnView<'_>,
    config: &MonteCarloConfig,
) -> Result<PortfolioSimulation> {
    let n = returns.num_assets();
    validate_weights(weights, n, WEIGHT_TOLERANCE)?;
    if returns.len() < 2 {
        return Err(PortfolioError::invalid_input(
            "Monte Carlo projection needs at least two return periods",
        ));
    }
    if config.num_simulations == 0 || config.horizon_days == 0 {
        return Err(PortfolioError::invalid_input(
            "simulation count and horizon must be positive",
        ));
    }
    if !(config.confidence_level > 0.0 && config.confidence_level < 1.0) {
        return Err(PortfolioError::invalid_input(
            "confidence must lie in (0, 1)",
        ));
    }

    let horizon = config.horizon_days as f64;
    let drift: Vec<f64> = returns.mean_returns().iter().map(|m| m * horizon).collect();
    let factor = linalg::cholesky(&linalg::scale(&returns.covariance(), horizon))?;

    // w'(μh + Lz) = w'μh + (L'w)'z
    let center = dot(weights, &drift);
    let loadings: Vec<f64> = (0..n)
        .map(|k| (0..n).map(|i| factor[i][k] * weights[i]).sum())
        .collect();

    let base_seed = config.seed.unwrap_or_else(rand::random);
    debug!(
        "Simulating {} portfolio outcomes over {} periods",
        config.num_simulations, config.horizon_days
    );

    let outcomes: Vec<f64> = (0..config.num_simulations)
        .into_par_iter()
        .map(|trial| {
            let mut rng = StdRng::seed_from_u64(trial_seed(base_seed, trial));
            let shock: f64 = loadings
                .iter()
                .map(|l| l * rng.sample::<f64, _>(StandardNormal))
                .sum();
            center + shock
        })
        .collect();

    let expected_return = mean(&outcomes);
    let volatility = population_std(&outcomes);
    let var = historical_var(&outcomes, config.confidence_level);
    let cvar = cvar_unchecked(&outcomes, config.confidence_level);
    let prob_loss =
        outcomes.iter().filter(|&&r| r < 0.0).count() as f64 / outcomes.len() as f64;
    let sharpe = ratio_or_zero(expected_return, Some(volatility));

    info!(
        "Monte Carlo projection: E[R]={:.4}, VaR={:.4}, CVaR={:.4}",
        expected_return, var, cvar
    );

    Ok(PortfolioSimulation {
        num_simulations: config.num_simulations,
        horizon_days: config.horizon_days,
        confidence_level: config.confidence_level,
        expected_return,
        volatility,
        var,
        cvar,
        prob_loss,
        sharpe,
    })
}

/// Per-trial seed, spread with the golden-ratio increment.
pub(crate) fn trial_seed(base: u64, trial: usize) -> u64 {
    base.wrapping_add((trial as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
