//! Closed-form financial arithmetic and retirement projections.
//!
//! This module provides:
//! - Bond price and modified duration for fixed-coupon bonds
//! - Time value of money (future/present value, annuities)
//! - Real return and tax-equivalent yield
//! - Retirement Monte Carlo over accumulation and drawdown phases

use crate::error::{PortfolioError, Result};
use crate::risk::trial_seed;
use crate::stats::percentile_sorted;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Fixed-coupon bond.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    /// Face (par) value.
    pub face: f64,
    /// Annual coupon rate (e.g., 0.05 for 5%).
    pub coupon_rate: f64,
    /// Annual yield to maturity.
    pub ytm: f64,
    /// Years to maturity.
    pub years: f64,
    /// Coupon payments per year.
    pub frequency: u32,
}

impl Bond {
    /// Semi-annual bond.
    pub fn new(face: f64, coupon_rate: f64, ytm: f64, years: f64) -> Self {
        Self {
            face,
            coupon_rate,
            ytm,
            years,
            frequency: 2,
        }
    }

    pub fn with_frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    fn periods(&self) -> u32 {
        (self.years * self.frequency as f64).max(0.0) as u32
    }

    fn coupon(&self) -> f64 {
        self.face * self.coupon_rate / self.frequency as f64
    }

    fn period_yield(&self) -> f64 {
        self.ytm / self.frequency as f64
    }

    fn validate(&self) -> Result<()> {
        if self.frequency == 0 {
            return Err(PortfolioError::invalid_input(
                "coupon frequency must be positive",
            ));
        }
        if self.period_yield() <= -1.0 {
            return Err(PortfolioError::invalid_input(
                "yield must exceed -100% per period",
            ));
        }
        Ok(())
    }

    /// Present value of coupons and face at the yield to maturity.
    pub fn price(&self) -> Result<f64> {
        self.validate()?;
        let n = self.periods();
        let c = self.coupon();
        let r = self.period_yield();
        let coupons: f64 = (1..=n).map(|t| c / (1.0 + r).powi(t as i32)).sum();
        Ok(coupons + self.face / (1.0 + r).powi(n as i32))
    }

    /// Modified duration in years: Macaulay duration divided by `1 + y/f`.
    pub fn modified_duration(&self) -> Result<f64> {
        let price = self.price()?;
        if price <= 0.0 {
            return Err(PortfolioError::invalid_input("bond price must be positive"));
        }
        let n = self.periods();
        if n == 0 {
            return Ok(0.0);
        }
        let f = self.frequency as f64;
        let c = self.coupon();
        let r = self.period_yield();

        let coupon_weighted: f64 = (1..n)
            .map(|t| (t as f64 / f) * c / (1.0 + r).powi(t as i32))
            .sum();
        let final_weighted = (n as f64 / f) * (c + self.face) / (1.0 + r).powi(n as i32);
        let macaulay = (coupon_weighted + final_weighted) / price;
        Ok(macaulay / (1.0 + r))
    }
}

/// Value of `pv` after compounding at `rate` for `years`.
pub fn future_value(pv: f64, rate: f64, years: f64) -> f64 {
    pv * (1.0 + rate).powf(years)
}

/// Value today of `fv` received after `years`.
pub fn present_value(fv: f64, rate: f64, years: f64) -> f64 {
    fv / (1.0 + rate).powf(years)
}

/// Present value of an ordinary annuity. A zero rate is the undiscounted sum.
pub fn annuity_pv(pmt: f64, rate: f64, years: f64) -> f64 {
    if rate == 0.0 {
        return pmt * years;
    }
    pmt * (1.0 - (1.0 + rate).powf(-years)) / rate
}

/// Future value of an ordinary annuity. A zero rate is the plain sum.
pub fn annuity_fv(pmt: f64, rate: f64, years: f64) -> f64 {
    if rate == 0.0 {
        return pmt * years;
    }
    pmt * ((1.0 + rate).powf(years) - 1.0) / rate
}

/// Inflation-adjusted return (Fisher relation).
pub fn real_return(nominal: f64, inflation: f64) -> f64 {
    (1.0 + nominal) / (1.0 + inflation) - 1.0
}

/// Taxable yield equivalent to a tax-exempt yield.
pub fn tax_equivalent_yield(tax_free_yield: f64, tax_rate: f64) -> Result<f64> {
    if !(0.0..1.0).contains(&tax_rate) {
        return Err(PortfolioError::invalid_input(format!(
            "tax rate must lie in [0, 1), got {}",
            tax_rate
        )));
    }
    Ok(tax_free_yield / (1.0 - tax_rate))
}

/// Inputs to [`retirement_monte_carlo`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetirementPlan {
    /// Current portfolio balance.
    pub initial_portfolio: f64,
    /// Added at the end of each working year.
    pub annual_contribution: f64,
    pub years_to_retirement: u32,
    pub years_in_retirement: u32,
    /// First-year withdrawal in today's money, grown with inflation.
    pub annual_withdrawal: f64,
    pub inflation: f64,
    pub expected_return: f64,
    pub volatility: f64,
    pub num_simulations: usize,
    /// Random seed for reproducibility (None for random).
    pub seed: Option<u64>,
}

impl RetirementPlan {
    pub fn new(
        initial_portfolio: f64,
        annual_contribution: f64,
        years_to_retirement: u32,
        years_in_retirement: u32,
        annual_withdrawal: f64,
    ) -> Self {
        Self {
            initial_portfolio,
            annual_contribution,
            years_to_retirement,
            years_in_retirement,
            annual_withdrawal,
            inflation: 0.03,
            expected_return: 0.07,
            volatility: 0.15,
            num_simulations: 10_000,
            seed: None,
        }
    }

    pub fn with_market(mut self, expected_return: f64, volatility: f64) -> Self {
        self.expected_return = expected_return;
        self.volatility = volatility;
        self
    }

    pub fn with_inflation(mut self, inflation: f64) -> Self {
        self.inflation = inflation;
        self
    }

    pub fn with_simulations(mut self, n: usize) -> Self {
        self.num_simulations = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Final balance of one simulated path.
    fn simulate_path(&self, normal: &Normal<f64>, rng: &mut StdRng) -> f64 {
        let total = self.years_to_retirement + self.years_in_retirement;
        (1..=total).fold(self.initial_portfolio, |balance, year| {
            let growth = balance * (1.0 + normal.sample(rng));
            let next = if year <= self.years_to_retirement {
                growth + self.annual_contribution
            } else {
                let retired = (year - self.years_to_retirement) as i32;
                growth - self.annual_withdrawal * (1.0 + self.inflation).powi(retired)
            };
            next.max(0.0)
        })
    }
}

/// Distribution of final balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetirementOutcome {
    pub num_simulations: usize,
    /// Fraction of paths ending with a positive balance.
    pub success_rate: f64,
    pub median: f64,
    pub p10: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
}

/// Simulate normally distributed yearly returns over the working and retired
/// years of `plan`. Balances never go below zero.
pub fn retirement_monte_carlo(plan: &RetirementPlan) -> Result<RetirementOutcome> {
    if plan.num_simulations == 0 {
        return Err(PortfolioError::invalid_input(
            "simulation count must be positive",
        ));
    }
    let normal = Normal::new(plan.expected_return, plan.volatility)
        .map_err(|e| PortfolioError::invalid_input(format!("return distribution: {}", e)))?;
    let base_seed = plan.seed.unwrap_or_else(rand::random);

    let mut finals: Vec<f64> = (0..plan.num_simulations)
        .into_par_iter()
        .map(|sim| {
            let mut rng = StdRng::seed_from_u64(trial_seed(base_seed, sim));
            plan.simulate_path(&normal, &mut rng)
        })
        .collect();
    finals.sort_by(|a, b| a.total_cmp(b));

    let success_rate =
        finals.iter().filter(|&&v| v > 0.0).count() as f64 / finals.len() as f64;
    let outcome = RetirementOutcome {
        num_simulations: plan.num_simulations,
        success_rate,
        median: percentile_sorted(&finals, 0.5),
        p10: percentile_sorted(&finals, 0.10),
        p25: percentile_sorted(&finals, 0.25),
        p75: percentile_sorted(&finals, 0.75),
        p90: percentile_sorted(&finals, 0.90),
    };

    info!(
        "Retirement simulation: success {:.1}%, median {:.0}",
        outcome.success_rate * 100.0,
        outcome.median
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bond_at_par() {
        let bond = Bond::new(1000.0, 0.05, 0.05, 10.0);
        assert!((bond.price().unwrap() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_bond_discount_and_premium() {
        assert!(Bond::new(1000.0, 0.03, 0.05, 10.0).price().unwrap() < 1000.0);
        assert!(Bond::new(1000.0, 0.07, 0.05, 10.0).price().unwrap() > 1000.0);
    }

    #[test]
    fn test_zero_coupon_duration() {
        // Macaulay duration of a zero equals maturity
        let bond = Bond::new(1000.0, 0.0, 0.04, 5.0);
        let d = bond.modified_duration().unwrap();
        assert!((d - 5.0 / 1.02).abs() < 1e-9);
    }

    #[test]
    fn test_duration_matches_price_sensitivity() {
        let bond = Bond::new(1000.0, 0.05, 0.06, 10.0);
        let d = bond.modified_duration().unwrap();
        let h = 1e-5;
        let up = Bond { ytm: 0.06 + h, ..bond }.price().unwrap();
        let down = Bond { ytm: 0.06 - h, ..bond }.price().unwrap();
        let numeric = -(up - down) / (2.0 * h) / bond.price().unwrap();
        assert!((d - numeric).abs() < 1e-4);
    }

    #[test]
    fn test_invalid_bond() {
        assert!(Bond::new(1000.0, 0.05, 0.05, 10.0)
            .with_frequency(0)
            .price()
            .is_err());
    }

    #[test]
    fn test_time_value_of_money() {
        assert!((future_value(100.0, 0.1, 2.0) - 121.0).abs() < 1e-9);
        assert!((present_value(121.0, 0.1, 2.0) - 100.0).abs() < 1e-9);
        assert!((annuity_fv(100.0, 0.1, 2.0) - 210.0).abs() < 1e-9);
        assert!((annuity_pv(110.0, 0.1, 1.0) - 100.0).abs() < 1e-9);
        assert_eq!(annuity_pv(100.0, 0.0, 5.0), 500.0);
        assert_eq!(annuity_fv(100.0, 0.0, 5.0), 500.0);
    }

    #[test]
    fn test_real_and_tax_equivalent() {
        assert!((real_return(0.05, 0.05)).abs() < 1e-12);
        assert!((real_return(0.08, 0.02) - (1.08 / 1.02 - 1.0)).abs() < 1e-12);
        assert!((tax_equivalent_yield(0.03, 0.25).unwrap() - 0.04).abs() < 1e-12);
        assert!(tax_equivalent_yield(0.03, 1.0).is_err());
    }

    #[test]
    fn test_retirement_deterministic_market() {
        // Zero volatility: every path is identical
        let plan = RetirementPlan::new(100_000.0, 10_000.0, 2, 1, 5_000.0)
            .with_market(0.0, 0.0)
            .with_inflation(0.0)
            .with_simulations(50)
            .with_seed(1);
        let outcome = retirement_monte_carlo(&plan).unwrap();
        assert!((outcome.median - 115_000.0).abs() < 1e-6);
        assert_eq!(outcome.success_rate, 1.0);
        assert_eq!(outcome.p10, outcome.p90);
    }

    #[test]
    fn test_retirement_depletion_clamped() {
        let plan = RetirementPlan::new(10_000.0, 0.0, 0, 5, 50_000.0)
            .with_market(0.0, 0.0)
            .with_simulations(10)
            .with_seed(2);
        let outcome = retirement_monte_carlo(&plan).unwrap();
        assert_eq!(outcome.success_rate, 0.0);
        assert_eq!(outcome.median, 0.0);
    }

    #[test]
    fn test_retirement_seeded_reproducible() {
        let plan = RetirementPlan::new(500_000.0, 20_000.0, 20, 30, 40_000.0)
            .with_simulations(500)
            .with_seed(42);
        let a = retirement_monte_carlo(&plan).unwrap();
        let b = retirement_monte_carlo(&plan).unwrap();
        assert_eq!(a.median, b.median);
        assert!(a.p10 <= a.p25 && a.p25 <= a.median && a.median <= a.p75 && a.p75 <= a.p90);
        assert!((0.0..=1.0).contains(&a.success_rate));
    }
}
