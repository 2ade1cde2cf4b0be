//! Pathwise - portfolio strategy backtesting, optimization, and tail-risk analysis.
//!
//! # Overview
//!
//! Pathwise simulates multi-asset allocation strategies over aligned periodic
//! return series and measures what they would have done:
//!
//! - **Backtesting**: periodic rebalancing with weight drift and turnover costs
//! - **Walk-forward analysis**: rolling train/test windows with out-of-sample scoring
//! - **Optimization**: long-only max-Sharpe, minimum-variance, and risk-parity weights
//! - **Black-Litterman**: posterior expected returns from market weights and views
//! - **Risk**: historical, parametric, and Monte Carlo VaR and CVaR
//! - **Stress testing**: historical replay and hypothetical shock scenarios
//! - **Finance helpers**: bond pricing, time value of money, retirement simulation
//! - **Configuration files**: TOML-based settings for reproducible runs
//!
//! # Quick Start
//!
//! ```no_run
//! use pathwise::data::load_prices_csv;
//! use pathwise::engine::{BacktestConfig, Backtester};
//! use pathwise::optimizer::Objective;
//! use pathwise::strategies::OptimizedAllocation;
//! use pathwise::types::RebalanceFrequency;
//!
//! let series = load_prices_csv("data/prices.csv").unwrap().into_returns().unwrap();
//!
//! let config = BacktestConfig::default()
//!     .with_initial_capital(100_000.0)
//!     .with_rebalance(RebalanceFrequency::Quarterly);
//! let backtester = Backtester::new(config);
//!
//! let mut strategy = OptimizedAllocation::new(Objective::MinVariance).with_lookback(252);
//! let run = backtester.run(&series, &mut strategy).unwrap();
//!
//! let metrics = run.metrics(0.0);
//! println!("Return: {:.2}%", metrics.total_return * 100.0);
//! println!("Sharpe: {:.2}", metrics.sharpe_ratio);
//! ```
//!
//! # Custom Strategies
//!
//! Implement [`AllocationStrategy`], or pass a closure:
//!
//! ```
//! use pathwise::strategy::AllocationStrategy;
//! use pathwise::types::ReturnView;
//! use chrono::{DateTime, Utc};
//!
//! struct TiltToFirst;
//!
//! impl AllocationStrategy for TiltToFirst {
//!     fn name(&self) -> &str {
//!         "Tilt"
//!     }
//!
//!     fn allocate(
//!         &mut self,
//!         history: &ReturnView<'_>,
//!         _as_of: DateTime<Utc>,
//!     ) -> pathwise::Result<Vec<f64>> {
//!         let n = history.num_assets();
//!         let mut weights = vec![0.5 / (n - 1).max(1) as f64; n];
//!         weights[0] = if n == 1 { 1.0 } else { 0.5 };
//!         Ok(weights)
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - [`types`]: Return series, views, weights, and rebalance schedules
//! - [`data`]: CSV loading of prices and returns
//! - [`strategy`]: The allocation strategy trait
//! - [`strategies`]: Built-in allocation strategies
//! - [`engine`]: Backtest simulator
//! - [`walkforward`]: Walk-forward analysis
//! - [`analytics`]: Performance metrics
//! - [`optimizer`]: Portfolio optimization and Black-Litterman
//! - [`risk`]: VaR, CVaR, and Monte Carlo portfolio simulation
//! - [`stress`]: Stress scenarios
//! - [`finance`]: Bond, time value of money, and retirement helpers
//! - [`config`]: TOML configuration file support

pub mod analytics;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod finance;
pub mod linalg;
pub mod optimizer;
pub mod risk;
pub mod stats;
pub mod strategies;
pub mod strategy;
pub mod stress;
pub mod types;
pub mod walkforward;

// Re-exports for convenience
pub use analytics::PerformanceMetrics;
pub use config::PathwiseConfig;
pub use data::{load_prices_csv, load_returns_csv, PriceTable};
pub use engine::{BacktestConfig, BacktestRun, Backtester, RebalanceEvent};
pub use error::{PortfolioError, Result};
pub use optimizer::{
    black_litterman, implied_returns, optimize, optimize_with, Objective, OptimizerSettings,
    View, ViewSet,
};
pub use risk::{
    calculate_cvar, calculate_var, monte_carlo_portfolio, MonteCarloConfig, PortfolioSimulation,
    VarMethod,
};
pub use strategy::AllocationStrategy;
pub use stress::{stress_test, Scenario};
pub use types::{RebalanceFrequency, ReturnSeries, ReturnView, ValuePoint};
pub use walkforward::{WalkForwardAnalyzer, WalkForwardConfig, WalkForwardResult};
