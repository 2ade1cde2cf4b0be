//! Constrained portfolio-weight optimization.
//!
//! Every objective is solved over the long-only simplex: weights sum to one
//! and each lies in [0, 1].
//!
//! - **Minimum variance** is a convex QP and is handed to Clarabel directly.
//! - **Maximum Sharpe** uses the convex reformulation
//!   `min y'Σy s.t. (μ - r_f)'y = 1, y >= 0`, `w = y / Σy` whenever some asset
//!   has a positive excess return. When none does, the negated Sharpe ratio is
//!   minimized by SQP.
//! - **Risk parity** minimizes the squared deviation of each asset's risk
//!   contribution from `σ_p / N` by SQP.
//!
//! The SQP loop keeps every iterate feasible: each step solves a QP
//! subproblem (damped-BFGS Hessian, central-difference gradient) over the
//! box `-w <= d <= 1 - w` with `Σd = 0`, followed by an Armijo line search.
//!
//! # Example
//!
//! ```
//! use pathwise::optimizer::{optimize, Objective};
//!
//! let mu = vec![0.08, 0.05];
//! let cov = vec![vec![0.04, 0.0], vec![0.0, 0.01]];
//! let w = optimize(&mu, &cov, 0.02, Objective::MinVariance).unwrap();
//! assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-6);
//! ```

use crate::error::{PortfolioError, Result};
use crate::linalg::{self, check_square, dot, mat_vec, quad_form};
use crate::types::equal_weights;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Volatility below which a portfolio is treated as riskless.
const VOL_FLOOR: f64 = 1e-12;

/// Optimization objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Objective {
    MaxSharpe,
    MinVariance,
    RiskParity,
}

impl Objective {
    pub fn name(&self) -> &'static str {
        match self {
            Objective::MaxSharpe => "Maximum Sharpe",
            Objective::MinVariance => "Minimum Variance",
            Objective::RiskParity => "Risk Parity",
        }
    }
}

/// Solver budget and tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerSettings {
    /// Maximum SQP iterations.
    pub max_iterations: usize,
    /// Iteration cap for each QP subproblem.
    pub qp_max_iterations: u32,
    /// Stop when the accepted step is smaller than this (infinity norm).
    pub step_tolerance: f64,
    /// Stop when the relative objective decrease is smaller than this.
    pub function_tolerance: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            qp_max_iterations: 200,
            step_tolerance: 1e-9,
            function_tolerance: 1e-14,
        }
    }
}

impl OptimizerSettings {
    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }
}

/// Optimize weights with default solver settings.
pub fn optimize(
    expected_returns: &[f64],
    covariance: &[Vec<f64>],
    risk_free_rate: f64,
    objective: Objective,
) -> Result<Vec<f64>> {
    optimize_with(
        expected_returns,
        covariance,
        risk_free_rate,
        objective,
        &OptimizerSettings::default(),
    )
}

/// Optimize weights for `objective` under the long-only simplex constraint.
pub fn optimize_with(
    expected_returns: &[f64],
    covariance: &[Vec<f64>],
    risk_free_rate: f64,
    objective: Objective,
    settings: &OptimizerSettings,
) -> Result<Vec<f64>> {
    let n = expected_returns.len();
    if n == 0 {
        return Err(PortfolioError::invalid_input("need at least one asset"));
    }
    if expected_returns.iter().any(|r| !r.is_finite()) || !risk_free_rate.is_finite() {
        return Err(PortfolioError::invalid_input(
            "expected returns and risk-free rate must be finite",
        ));
    }
    check_square(covariance, n, "covariance matrix")?;

    if n == 1 {
        return Ok(vec![1.0]);
    }

    // No feasible portfolio carries risk: every objective is flat or undefined.
    if (0..n).all(|i| covariance[i][i].abs() <= f64::EPSILON) {
        warn!(
            "{} objective with zero covariance, falling back to equal weights",
            objective.name()
        );
        return Ok(equal_weights(n));
    }

    let raw = match objective {
        Objective::MinVariance => minimum_variance(covariance, settings)?,
        Objective::MaxSharpe => {
            maximum_sharpe(expected_returns, covariance, risk_free_rate, settings)?
        }
        Objective::RiskParity => {
            let f = |w: &[f64]| risk_parity_objective(covariance, w);
            sqp_minimize(&f, n, settings)?
        }
    };

    Ok(clean_weights(raw))
}

/// Expected portfolio return `w'μ`.
pub fn portfolio_return(weights: &[f64], expected_returns: &[f64]) -> f64 {
    dot(weights, expected_returns)
}

/// Portfolio volatility `sqrt(w'Σw)`.
pub fn portfolio_volatility(weights: &[f64], covariance: &[Vec<f64>]) -> f64 {
    quad_form(covariance, weights).max(0.0).sqrt()
}

/// Each asset's contribution to portfolio volatility, `w_i (Σw)_i / σ_p`.
///
/// Contributions sum to `σ_p`. A riskless portfolio has all-zero contributions.
pub fn risk_contributions(weights: &[f64], covariance: &[Vec<f64>]) -> Vec<f64> {
    let sigma_w = mat_vec(covariance, weights);
    let vol = dot(weights, &sigma_w).max(0.0).sqrt();
    if vol < VOL_FLOOR {
        return vec![0.0; weights.len()];
    }
    weights
        .iter()
        .zip(&sigma_w)
        .map(|(w, s)| w * s / vol)
        .collect()
}

fn risk_parity_objective(covariance: &[Vec<f64>], w: &[f64]) -> f64 {
    let sigma_w = mat_vec(covariance, w);
    let vol = dot(w, &sigma_w).max(0.0).sqrt();
    if vol < VOL_FLOOR {
        return 0.0;
    }
    let target = vol / w.len() as f64;
    w.iter()
        .zip(&sigma_w)
        .map(|(wi, si)| (wi * si / vol - target).powi(2))
        .sum()
}

fn negative_sharpe(expected_returns: &[f64], covariance: &[Vec<f64>], rf: f64, w: &[f64]) -> f64 {
    let excess = dot(w, expected_returns) - rf;
    let vol = portfolio_volatility(w, covariance).max(VOL_FLOOR);
    -excess / vol
}

fn minimum_variance(covariance: &[Vec<f64>], settings: &OptimizerSettings) -> Result<Vec<f64>> {
    let n = covariance.len();
    let zeros = vec![0.0; n];
    let ones = vec![1.0; n];
    solve_qp(
        &QuadraticProgram {
            hessian: covariance,
            linear: &zeros,
            equality: &ones,
            equality_rhs: 1.0,
            lower: &zeros,
            upper: Some(&ones),
        },
        settings.qp_max_iterations,
    )
}

fn maximum_sharpe(
    expected_returns: &[f64],
    covariance: &[Vec<f64>],
    rf: f64,
    settings: &OptimizerSettings,
) -> Result<Vec<f64>> {
    let n = expected_returns.len();
    let excess: Vec<f64> = expected_returns.iter().map(|r| r - rf).collect();
    let sharpe_by_sqp = || {
        let f = |w: &[f64]| negative_sharpe(expected_returns, covariance, rf, w);
        sqp_minimize(&f, n, settings)
    };

    let best_excess = excess.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if best_excess <= 0.0 {
        debug!("No asset beats the risk-free rate, minimizing negative Sharpe by SQP");
        return sharpe_by_sqp();
    }

    // Scale both sides to unit magnitude; neither changes the direction of y.
    let max_variance = (0..n).fold(0.0_f64, |acc, i| acc.max(covariance[i][i].abs()));
    let hessian = linalg::scale(covariance, 1.0 / max_variance);
    let equality: Vec<f64> = excess.iter().map(|e| e / best_excess).collect();
    let zeros = vec![0.0; n];
    let solved = solve_qp(
        &QuadraticProgram {
            hessian: &hessian,
            linear: &zeros,
            equality: &equality,
            equality_rhs: 1.0,
            lower: &zeros,
            upper: None,
        },
        settings.qp_max_iterations,
    );

    let y = match solved {
        Ok(y) => y,
        Err(e) => {
            warn!("Max Sharpe reformulation failed ({}), falling back to SQP", e);
            return sharpe_by_sqp();
        }
    };

    let total: f64 = y.iter().map(|v| v.max(0.0)).sum();
    if !(total > VOL_FLOOR) || !total.is_finite() {
        warn!("Max Sharpe reformulation produced an empty portfolio, falling back to SQP");
        return sharpe_by_sqp();
    }
    Ok(y.iter().map(|v| v.max(0.0) / total).collect())
}

/// Clamp solver noise into [0, 1] and renormalize to sum to one.
fn clean_weights(raw: Vec<f64>) -> Vec<f64> {
    let clamped: Vec<f64> = raw
        .into_iter()
        .map(|w| if w.is_finite() { w.clamp(0.0, 1.0) } else { 0.0 })
        .collect();
    let total: f64 = clamped.iter().sum();
    if total <= 0.0 {
        return equal_weights(clamped.len());
    }
    clamped.into_iter().map(|w| w / total).collect()
}

/// Convex QP: `min ½x'Hx + c'x` s.t. `a'x = b`, `lower <= x <= upper`.
struct QuadraticProgram<'a> {
    hessian: &'a [Vec<f64>],
    linear: &'a [f64],
    equality: &'a [f64],
    equality_rhs: f64,
    lower: &'a [f64],
    upper: Option<&'a [f64]>,
}

fn solve_qp(qp: &QuadraticProgram<'_>, max_iter: u32) -> Result<Vec<f64>> {
    use clarabel::algebra::*;
    use clarabel::solver::*;

    let n = qp.linear.len();

    // P in CSC format, upper triangle only
    let mut p_data = Vec::new();
    let mut p_indices = Vec::new();
    let mut p_indptr = vec![0];
    for j in 0..n {
        for i in 0..=j {
            let val = qp.hessian[i][j];
            if val != 0.0 {
                p_data.push(val);
                p_indices.push(i);
            }
        }
        p_indptr.push(p_data.len());
    }
    let p = CscMatrix::new(n, n, p_indptr, p_indices, p_data);

    // Rows: [equality; -x <= -lower; x <= upper]
    let has_upper = qp.upper.is_some();
    let rows = 1 + n + if has_upper { n } else { 0 };
    let mut a_data = Vec::new();
    let mut a_indices = Vec::new();
    let mut a_indptr = vec![0];
    for j in 0..n {
        if qp.equality[j] != 0.0 {
            a_data.push(qp.equality[j]);
            a_indices.push(0);
        }
        a_data.push(-1.0);
        a_indices.push(1 + j);
        if has_upper {
            a_data.push(1.0);
            a_indices.push(1 + n + j);
        }
        a_indptr.push(a_data.len());
    }
    let a = CscMatrix::new(rows, n, a_indptr, a_indices, a_data);

    let mut b = Vec::with_capacity(rows);
    b.push(qp.equality_rhs);
    b.extend(qp.lower.iter().map(|l| -l));
    if let Some(upper) = qp.upper {
        b.extend_from_slice(upper);
    }

    let cones = [ZeroConeT(1), NonnegativeConeT(rows - 1)];

    let settings = DefaultSettingsBuilder::default()
        .max_iter(max_iter)
        .verbose(false)
        .build()
        .map_err(|e| PortfolioError::Convergence(format!("Failed to build settings: {}", e)))?;

    let mut solver = DefaultSolver::new(&p, qp.linear, &a, &b, &cones, settings)
        .map_err(|e| PortfolioError::Convergence(format!("Failed to create solver: {:?}", e)))?;

    solver.solve();

    match solver.solution.status {
        SolverStatus::Solved | SolverStatus::AlmostSolved => Ok(solver.solution.x.clone()),
        status => Err(PortfolioError::Convergence(format!(
            "QP subproblem failed with status: {:?}",
            status
        ))),
    }
}

/// Central-difference gradient.
fn numerical_gradient(f: &dyn Fn(&[f64]) -> f64, x: &[f64]) -> Vec<f64> {
    let mut shifted = x.to_vec();
    (0..x.len())
        .map(|i| {
            let h = 1e-6 * x[i].abs().max(1.0);
            shifted[i] = x[i] + h;
            let up = f(&shifted);
            shifted[i] = x[i] - h;
            let down = f(&shifted);
            shifted[i] = x[i];
            (up - down) / (2.0 * h)
        })
        .collect()
}

/// Powell-damped BFGS update, keeping `b` positive definite.
#[allow(clippy::needless_range_loop)]
fn bfgs_update(b: &mut [Vec<f64>], s: &[f64], y: &[f64]) {
    let bs = mat_vec(b, s);
    let sbs = dot(s, &bs);
    if sbs <= 1e-300 {
        return;
    }
    let sy = dot(s, y);
    let theta = if sy >= 0.2 * sbs {
        1.0
    } else {
        0.8 * sbs / (sbs - sy)
    };
    let r: Vec<f64> = y
        .iter()
        .zip(&bs)
        .map(|(yi, bsi)| theta * yi + (1.0 - theta) * bsi)
        .collect();
    let sr = dot(s, &r);
    if sr <= 1e-300 {
        return;
    }
    let n = s.len();
    for i in 0..n {
        for j in 0..n {
            b[i][j] += r[i] * r[j] / sr - bs[i] * bs[j] / sbs;
        }
    }
}

/// Minimize `f` over the simplex by sequential quadratic programming,
/// starting from equal weights.
fn sqp_minimize(
    f: &dyn Fn(&[f64]) -> f64,
    n: usize,
    settings: &OptimizerSettings,
) -> Result<Vec<f64>> {
    let mut w = equal_weights(n);
    let mut fw = f(&w);
    let mut grad = numerical_gradient(f, &w);
    let mut hessian: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();
    let ones = vec![1.0; n];

    for iteration in 0..settings.max_iterations {
        let lower: Vec<f64> = w.iter().map(|wi| -wi).collect();
        let upper: Vec<f64> = w.iter().map(|wi| 1.0 - wi).collect();
        let step = solve_qp(
            &QuadraticProgram {
                hessian: &hessian,
                linear: &grad,
                equality: &ones,
                equality_rhs: 0.0,
                lower: &lower,
                upper: Some(&upper),
            },
            settings.qp_max_iterations,
        )?;

        let step_norm = step.iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
        let slope = dot(&grad, &step);
        if step_norm < settings.step_tolerance || slope >= 0.0 {
            debug!("SQP converged after {} iterations (f = {:.3e})", iteration, fw);
            return Ok(w);
        }

        // Armijo backtracking on the feasible segment w + αd
        let mut alpha = 1.0;
        let mut candidate: Vec<f64>;
        let mut f_candidate;
        loop {
            candidate = w
                .iter()
                .zip(&step)
                .map(|(wi, di)| (wi + alpha * di).clamp(0.0, 1.0))
                .collect();
            let total: f64 = candidate.iter().sum();
            candidate.iter_mut().for_each(|c| *c /= total);
            f_candidate = f(&candidate);
            if f_candidate <= fw + 1e-4 * alpha * slope {
                break;
            }
            alpha *= 0.5;
            if alpha < 1e-10 {
                debug!(
                    "SQP line search stalled after {} iterations (f = {:.3e})",
                    iteration, fw
                );
                return Ok(w);
            }
        }

        let s: Vec<f64> = candidate.iter().zip(&w).map(|(c, wi)| c - wi).collect();
        let new_grad = numerical_gradient(f, &candidate);
        let y: Vec<f64> = new_grad.iter().zip(&grad).map(|(g1, g0)| g1 - g0).collect();

        if iteration == 0 {
            // Scale the initial identity to the observed curvature
            let sy = dot(&s, &y);
            if sy > 0.0 {
                let scale = dot(&y, &y) / sy;
                hessian = linalg::scale(&hessian, scale);
            }
        }
        bfgs_update(&mut hessian, &s, &y);

        let decrease = fw - f_candidate;
        let moved = s.iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
        w = candidate;
        fw = f_candidate;
        grad = new_grad;

        if moved < settings.step_tolerance
            || decrease.abs() <= settings.function_tolerance * (1.0 + fw.abs())
        {
            debug!("SQP converged after {} iterations (f = {:.3e})", iteration + 1, fw);
            return Ok(w);
        }
    }

    Err(PortfolioError::Convergence(format!(
        "SQP did not converge within {} iterations",
        settings.max_iterations
    )))
}

/// Investor view on named assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum View {
    /// `asset` will return `expected_return`, with view variance `variance`.
    Absolute {
        asset: String,
        expected_return: f64,
        variance: f64,
    },
    /// `outperformer` will beat `underperformer` by `spread`.
    Relative {
        outperformer: String,
        underperformer: String,
        spread: f64,
        variance: f64,
    },
}

/// Black-Litterman views in matrix form: pick matrix `P` (k x n),
/// view returns `Q` (k), and view uncertainty `Ω` (k x k).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewSet {
    pub pick: Vec<Vec<f64>>,
    pub returns: Vec<f64>,
    pub uncertainty: Vec<Vec<f64>>,
}

impl ViewSet {
    /// Build `P`, `Q`, and a diagonal `Ω` from named views.
    pub fn from_views(assets: &[String], views: &[View]) -> Result<Self> {
        let n = assets.len();
        let k = views.len();
        let index = |name: &str| {
            assets.iter().position(|a| a == name).ok_or_else(|| {
                PortfolioError::invalid_input(format!("View references unknown asset: {}", name))
            })
        };

        let mut set = ViewSet {
            pick: vec![vec![0.0; n]; k],
            returns: vec![0.0; k],
            uncertainty: vec![vec![0.0; k]; k],
        };
        for (row, view) in views.iter().enumerate() {
            match view {
                View::Absolute {
                    asset,
                    expected_return,
                    variance,
                } => {
                    set.pick[row][index(asset)?] = 1.0;
                    set.returns[row] = *expected_return;
                    set.uncertainty[row][row] = *variance;
                }
                View::Relative {
                    outperformer,
                    underperformer,
                    spread,
                    variance,
                } => {
                    set.pick[row][index(outperformer)?] = 1.0;
                    set.pick[row][index(underperformer)?] = -1.0;
                    set.returns[row] = *spread;
                    set.uncertainty[row][row] = *variance;
                }
            }
        }
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.returns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

/// Market-implied equilibrium returns `π = δ Σ w_mkt`.
pub fn implied_returns(
    market_weights: &[f64],
    covariance: &[Vec<f64>],
    risk_aversion: f64,
) -> Vec<f64> {
    mat_vec(covariance, market_weights)
        .into_iter()
        .map(|v| risk_aversion * v)
        .collect()
}

/// Black-Litterman posterior expected returns.
///
/// `E[R] = [(τΣ)⁻¹ + P'Ω⁻¹P]⁻¹ [(τΣ)⁻¹π + P'Ω⁻¹Q]`. With no views the
/// posterior equals the prior `π`. The result is an expected-return vector to
/// be fed back into [`optimize`].
#[allow(clippy::needless_range_loop)]
pub fn black_litterman(
    market_weights: &[f64],
    covariance: &[Vec<f64>],
    risk_aversion: f64,
    views: &ViewSet,
    tau: f64,
) -> Result<Vec<f64>> {
    let n = market_weights.len();
    let k = views.len();
    check_square(covariance, n, "covariance matrix")?;
    if tau <= 0.0 || tau > 1.0 {
        return Err(PortfolioError::invalid_input(
            "Tau must be between 0 and 1 (typically 0.025-0.05)",
        ));
    }
    if risk_aversion <= 0.0 {
        return Err(PortfolioError::invalid_input("Risk aversion must be positive"));
    }
    if views.pick.len() != k || views.pick.iter().any(|row| row.len() != n) {
        return Err(PortfolioError::invalid_input(format!(
            "pick matrix must be {}x{}",
            k, n
        )));
    }
    check_square(&views.uncertainty, k, "view uncertainty matrix")?;

    let prior = implied_returns(market_weights, covariance, risk_aversion);
    if k == 0 {
        return Ok(prior);
    }

    let tau_cov_inv = linalg::invert(&linalg::scale(covariance, tau))?;
    let omega_inv = linalg::invert(&views.uncertainty)?;

    // P'Ω⁻¹ (n x k)
    let mut pt_omega_inv = vec![vec![0.0; k]; n];
    for i in 0..n {
        for j in 0..k {
            pt_omega_inv[i][j] = (0..k).map(|v| views.pick[v][i] * omega_inv[v][j]).sum();
        }
    }

    let mut precision = tau_cov_inv.clone();
    for i in 0..n {
        for j in 0..n {
            precision[i][j] += (0..k).map(|v| pt_omega_inv[i][v] * views.pick[v][j]).sum::<f64>();
        }
    }
    let posterior_cov = linalg::invert(&precision)?;

    let prior_term = mat_vec(&tau_cov_inv, &prior);
    let view_term = mat_vec(&pt_omega_inv, &views.returns);
    let rhs: Vec<f64> = prior_term.iter().zip(&view_term).map(|(a, b)| a + b).collect();

    Ok(mat_vec(&posterior_cov, &rhs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_asset_cov() -> Vec<Vec<f64>> {
        vec![
            vec![0.040, 0.006, 0.002],
            vec![0.006, 0.025, 0.004],
            vec![0.002, 0.004, 0.010],
        ]
    }

    fn assert_simplex(w: &[f64]) {
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-6);
        assert!(w.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }

    #[test]
    fn test_min_variance_beats_equal_weight() {
        let cov = three_asset_cov();
        let w = optimize(&[0.1, 0.08, 0.05], &cov, 0.02, Objective::MinVariance).unwrap();
        assert_simplex(&w);
        let eq = equal_weights(3);
        assert!(quad_form(&cov, &w) <= quad_form(&cov, &eq) + 1e-12);
    }

    #[test]
    fn test_min_variance_uncorrelated_closed_form() {
        // Inverse-variance weights: 1/0.04 : 1/0.01 = 1 : 4
        let cov = vec![vec![0.04, 0.0], vec![0.0, 0.01]];
        let w = optimize(&[0.0, 0.0], &cov, 0.0, Objective::MinVariance).unwrap();
        assert!((w[0] - 0.2).abs() < 1e-4);
        assert!((w[1] - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_max_sharpe_uncorrelated_closed_form() {
        // Tangency weights ∝ Σ⁻¹(μ - r_f) = [0.05/0.04, 0.03/0.01] = [1.25, 3]
        let cov = vec![vec![0.04, 0.0], vec![0.0, 0.01]];
        let w = optimize(&[0.07, 0.05], &cov, 0.02, Objective::MaxSharpe).unwrap();
        assert_simplex(&w);
        assert!((w[0] - 1.25 / 4.25).abs() < 1e-4);
        assert!((w[1] - 3.0 / 4.25).abs() < 1e-4);
    }

    #[test]
    fn test_max_sharpe_all_negative_excess() {
        let cov = three_asset_cov();
        let w = optimize(&[0.01, 0.015, 0.012], &cov, 0.05, Objective::MaxSharpe).unwrap();
        assert_simplex(&w);
        let sharpe = |w: &[f64]| -negative_sharpe(&[0.01, 0.015, 0.012], &cov, 0.05, w);
        assert!(sharpe(&w) >= sharpe(&equal_weights(3)) - 1e-9);
    }

    #[test]
    fn test_max_sharpe_barely_above_risk_free() {
        let cov = three_asset_cov();
        let mu = [0.045 + 1e-6, 0.03, 0.02];
        let w = optimize(&mu, &cov, 0.045, Objective::MaxSharpe).unwrap();
        assert_simplex(&w);
        assert!(w[0] > 0.99, "{:?}", w);
    }

    #[test]
    fn test_max_sharpe_daily_scale_inputs() {
        let cov = linalg::scale(&three_asset_cov(), 1.0 / 252.0);
        let mu = [1e-7, -1e-4, -2e-4];
        let w = optimize(&mu, &cov, 0.0, Objective::MaxSharpe).unwrap();
        assert_simplex(&w);
        assert!(w[0] > 0.99, "{:?}", w);

        let mixed = [4e-4, 1e-4, -2e-4];
        let w = optimize(&mixed, &cov, 0.0, Objective::MaxSharpe).unwrap();
        assert_simplex(&w);
        let sharpe = |w: &[f64]| -negative_sharpe(&mixed, &cov, 0.0, w);
        assert!(sharpe(&w) >= sharpe(&equal_weights(3)));
    }

    #[test]
    fn test_risk_parity_uncorrelated_inverse_vol() {
        // Equal risk contributions with zero correlation: w ∝ 1/σ = 1/0.2 : 1/0.1
        let cov = vec![vec![0.04, 0.0], vec![0.0, 0.01]];
        let w = optimize(&[0.0, 0.0], &cov, 0.0, Objective::RiskParity).unwrap();
        assert_simplex(&w);
        assert!((w[0] - 1.0 / 3.0).abs() < 1e-3);
        assert!((w[1] - 2.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_risk_parity_equalizes_contributions() {
        let cov = three_asset_cov();
        let w = optimize(&[0.0; 3], &cov, 0.0, Objective::RiskParity).unwrap();
        assert_simplex(&w);
        let rc = risk_contributions(&w, &cov);
        let vol = portfolio_volatility(&w, &cov);
        assert!((rc.iter().sum::<f64>() - vol).abs() < 1e-9);
        for c in rc {
            assert!((c - vol / 3.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_zero_covariance_falls_back_to_equal_weights() {
        let cov = vec![vec![0.0; 2]; 2];
        let w = optimize(&[0.1, 0.2], &cov, 0.0, Objective::MaxSharpe).unwrap();
        assert_eq!(w, vec![0.5, 0.5]);
    }

    #[test]
    fn test_invalid_shapes() {
        let cov = vec![vec![0.04, 0.0]];
        assert!(matches!(
            optimize(&[0.1, 0.2], &cov, 0.0, Objective::MinVariance),
            Err(PortfolioError::InvalidInput(_))
        ));
        assert!(optimize(&[], &[], 0.0, Objective::MinVariance).is_err());
    }

    #[test]
    fn test_single_asset() {
        let w = optimize(&[0.1], &[vec![0.04]], 0.0, Objective::RiskParity).unwrap();
        assert_eq!(w, vec![1.0]);
    }

    #[test]
    fn test_black_litterman_no_views_is_prior() {
        let cov = three_asset_cov();
        let mkt = [0.5, 0.3, 0.2];
        let post = black_litterman(&mkt, &cov, 2.5, &ViewSet::default(), 0.05).unwrap();
        let prior = implied_returns(&mkt, &cov, 2.5);
        for (a, b) in post.iter().zip(&prior) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_black_litterman_tilts_toward_view() {
        let cov = three_asset_cov();
        let mkt = [0.5, 0.3, 0.2];
        let assets: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let views = ViewSet::from_views(
            &assets,
            &[View::Absolute {
                asset: "c".to_string(),
                expected_return: 0.20,
                variance: 0.001,
            }],
        )
        .unwrap();

        let prior = implied_returns(&mkt, &cov, 2.5);
        let post = black_litterman(&mkt, &cov, 2.5, &views, 0.05).unwrap();
        assert!(post[2] > prior[2]);
        assert!(post[2] < 0.20);
    }

    #[test]
    fn test_black_litterman_singular_omega() {
        let cov = three_asset_cov();
        let views = ViewSet {
            pick: vec![vec![1.0, 0.0, 0.0]],
            returns: vec![0.1],
            uncertainty: vec![vec![0.0]],
        };
        assert!(matches!(
            black_litterman(&[0.5, 0.3, 0.2], &cov, 2.5, &views, 0.05),
            Err(PortfolioError::SingularMatrix(_))
        ));
    }

    #[test]
    fn test_view_unknown_asset() {
        let assets = vec!["a".to_string()];
        let views = [View::Relative {
            outperformer: "a".to_string(),
            underperformer: "z".to_string(),
            spread: 0.02,
            variance: 0.01,
        }];
        assert!(ViewSet::from_views(&assets, &views).is_err());
    }
}
