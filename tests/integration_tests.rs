//! Integration tests across loading, simulation, optimization, and risk.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use pathwise::config::PathwiseConfig;
use pathwise::data::load_returns_csv;
use pathwise::engine::{BacktestConfig, Backtester};
use pathwise::error::PortfolioError;
use pathwise::optimizer::{optimize, portfolio_volatility, Objective};
use pathwise::risk::{
    calculate_cvar, calculate_var, monte_carlo_portfolio, MonteCarloConfig, VarMethod,
};
use pathwise::strategies::{EqualWeight, FixedWeights, OptimizedAllocation};
use pathwise::stress::{hypothetical_scenarios, stress_test, Scenario};
use pathwise::types::{RebalanceFrequency, ReturnSeries, ReturnView};
use pathwise::walkforward::{WalkForwardAnalyzer, WalkForwardConfig};
use std::collections::BTreeMap;
use std::io::Write;
use tempfile::NamedTempFile;

/// Deterministic daily returns for equities, bonds, commodities, and gold.
fn create_synthetic_series(days: usize) -> ReturnSeries {
    let start = Utc.with_ymd_and_hms(2022, 1, 3, 0, 0, 0).unwrap();
    let rows = (0..days)
        .map(|i| {
            let x = i as f64;
            vec![
                0.0006 + 0.015 * (x * 0.7).sin(),
                0.0002 + 0.004 * (x * 1.3).cos(),
                0.0003 + 0.012 * (x * 0.3).sin() * (x * 1.1).cos(),
                0.0004 + 0.009 * (x * 0.5 + 1.0).sin(),
            ]
        })
        .collect();
    ReturnSeries::new(
        vec![
            "equities".to_string(),
            "bonds".to_string(),
            "commodities".to_string(),
            "gold".to_string(),
        ],
        (0..days).map(|i| start + Duration::days(i as i64)).collect(),
        rows,
    )
    .unwrap()
}

fn write_price_csv(days: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "date,equities,bonds").unwrap();
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let (mut a, mut b) = (100.0_f64, 50.0_f64);
    for i in 0..days {
        let x = i as f64;
        a *= 1.0 + 0.0005 + 0.01 * (x * 0.9).sin();
        b *= 1.0 + 0.0001 + 0.002 * (x * 1.7).cos();
        let date = start + Duration::days(i as i64);
        writeln!(file, "{},{:.6},{:.6}", date.format("%Y-%m-%d"), a, b).unwrap();
    }
    file
}

#[test]
fn test_csv_to_backtest_to_metrics() {
    let file = write_price_csv(200);
    let series = load_returns_csv(file.path()).unwrap();
    assert_eq!(series.len(), 199);
    assert_eq!(series.assets(), ["equities", "bonds"]);

    let backtester = Backtester::new(
        BacktestConfig::default()
            .with_initial_capital(100_000.0)
            .with_rebalance(RebalanceFrequency::Monthly),
    );
    let mut strategy = FixedWeights::new(vec![0.6, 0.4]).unwrap();
    let run = backtester.run(&series, &mut strategy).unwrap();

    assert_eq!(run.strategy_name, "Fixed Weights");
    assert_eq!(run.values.len(), series.len());
    assert_eq!(run.values.last().unwrap().value, run.final_value);
    // Initial allocation plus one per month end (Jan 2023 through Jun 2023);
    // the series stops on Jul 20, mid-month.
    assert_eq!(run.rebalances.len(), 1 + 6);
    assert_ne!(run.rebalances.last().unwrap().timestamp, run.values.last().unwrap().timestamp);
    assert_eq!(run.rebalances[0].turnover, 0.0);
    assert!(run.total_costs > 0.0);

    let metrics = run.metrics(0.0);
    assert_eq!(metrics.periods, series.len());
    assert!(metrics.max_drawdown <= 0.0);
    assert!(metrics.volatility > 0.0);
    assert!(metrics.cvar_95 >= metrics.var_95);
}

#[test]
fn test_costs_reduce_final_value() {
    let series = create_synthetic_series(300);
    let mut free = EqualWeight;
    let mut costly = EqualWeight;

    let base = BacktestConfig::default().with_rebalance(RebalanceFrequency::Weekly);
    let run_free = Backtester::new(base.clone().with_cost_rate(0.0))
        .run(&series, &mut free)
        .unwrap();
    let run_costly = Backtester::new(base.with_cost_rate(0.01))
        .run(&series, &mut costly)
        .unwrap();

    assert_eq!(run_free.total_costs, 0.0);
    assert!(run_costly.total_costs > 0.0);
    assert!(run_costly.final_value < run_free.final_value);
}

#[test]
fn test_optimized_strategy_backtest() {
    let series = create_synthetic_series(400);
    let backtester =
        Backtester::new(BacktestConfig::default().with_rebalance(RebalanceFrequency::Quarterly));

    for objective in [Objective::MinVariance, Objective::RiskParity, Objective::MaxSharpe] {
        let mut strategy = OptimizedAllocation::new(objective).with_lookback(120);
        let run = backtester.run(&series, &mut strategy).unwrap();
        assert_eq!(run.values.len(), series.len());
        for event in &run.rebalances {
            let sum: f64 = event.weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-6, "{:?}: {:?}", objective, event.weights);
            assert!(event.weights.iter().all(|&w| w >= -1e-9));
        }
    }
}

#[test]
fn test_closure_strategy_sees_history_up_to_rebalance() {
    let series = create_synthetic_series(90);
    let mut seen = Vec::new();
    let mut strategy =
        |history: &ReturnView<'_>, as_of: DateTime<Utc>| -> pathwise::Result<Vec<f64>> {
            assert_eq!(history.last_timestamp(), Some(as_of));
            seen.push(history.len());
            Ok(vec![0.25; 4])
        };

    let backtester =
        Backtester::new(BacktestConfig::default().with_rebalance(RebalanceFrequency::Monthly));
    backtester.run(&series, &mut strategy).unwrap();

    assert!(seen.len() >= 3);
    assert_eq!(seen[0], 1);
    assert!(seen.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_bad_strategy_weights_abort_run() {
    let series = create_synthetic_series(30);
    let mut strategy = |_h: &ReturnView<'_>, _t: DateTime<Utc>| -> pathwise::Result<Vec<f64>> {
        Ok(vec![0.5, 0.5, 0.5, 0.5])
    };
    let result = Backtester::default().run(&series, &mut strategy);
    assert!(matches!(result, Err(PortfolioError::InvalidWeights(_))));
}

#[test]
fn test_walk_forward_with_optimizer() {
    let series = create_synthetic_series(400);
    let analyzer = WalkForwardAnalyzer::new(WalkForwardConfig::new(200, 50));

    let sequential = analyzer
        .run(&series, &mut OptimizedAllocation::new(Objective::MinVariance))
        .unwrap();
    let parallel = analyzer
        .run_parallel(&series, || OptimizedAllocation::new(Objective::MinVariance))
        .unwrap();

    assert_eq!(sequential.windows.len(), 4);
    assert_eq!(parallel.windows.len(), 4);
    for (a, b) in sequential.windows.iter().zip(&parallel.windows) {
        assert_eq!(a.window, b.window);
        assert!((a.total_return - b.total_return).abs() < 1e-12);
    }
    assert!((0.0..=1.0).contains(&sequential.positive_ratio));
    assert!(sequential.summary().contains("Windows: 4"));
}

#[test]
fn test_min_variance_beats_equal_weight_in_sample() {
    let series = create_synthetic_series(500);
    let view = series.view();
    let mu = view.mean_returns();
    let cov = view.covariance();

    let weights = optimize(&mu, &cov, 0.0, Objective::MinVariance).unwrap();
    let equal = vec![0.25; 4];
    assert!(portfolio_volatility(&weights, &cov) <= portfolio_volatility(&equal, &cov) + 1e-12);
}

#[test]
fn test_risk_measures_on_backtest_returns() {
    let series = create_synthetic_series(500);
    let weights = vec![0.4, 0.3, 0.2, 0.1];
    let returns = series.view().portfolio_returns(&weights);

    let historical = calculate_var(&returns, 0.95, &VarMethod::Historical).unwrap();
    let parametric = calculate_var(&returns, 0.95, &VarMethod::Parametric).unwrap();
    let simulated = calculate_var(&returns, 0.95, &VarMethod::monte_carlo_seeded(11)).unwrap();
    let cvar = calculate_cvar(&returns, 0.95).unwrap();

    assert!(historical > 0.0);
    assert!(parametric > 0.0);
    assert!((simulated - parametric).abs() < 0.1 * parametric);
    assert!(cvar >= historical);
}

#[test]
fn test_monte_carlo_projection_is_seeded() {
    let series = create_synthetic_series(300);
    let weights = vec![0.25; 4];
    let config = MonteCarloConfig::default()
        .with_simulations(2_000)
        .with_horizon(21)
        .with_seed(5);

    let a = monte_carlo_portfolio(&weights, &series.view(), &config).unwrap();
    let b = monte_carlo_portfolio(&weights, &series.view(), &config).unwrap();
    assert_eq!(a.var, b.var);
    assert_eq!(a.expected_return, b.expected_return);
    assert!(a.cvar >= a.var);
    assert!((0.0..=1.0).contains(&a.prob_loss));
}

#[test]
fn test_stress_scenarios() {
    let series = create_synthetic_series(60);
    let weights = vec![0.4, 0.3, 0.2, 0.1];

    let mut scenarios = hypothetical_scenarios();
    scenarios.insert(
        "First Week".to_string(),
        Scenario::Historical {
            start: NaiveDate::from_ymd_opt(2022, 1, 3).unwrap(),
            end: NaiveDate::from_ymd_opt(2022, 1, 9).unwrap(),
        },
    );
    let results = stress_test(&weights, &series, &scenarios).unwrap();

    // 0.4 * -0.20 + 0.3 * -0.05 + 0.2 * 0.15 + 0.1 * 0.25
    assert!((results["Stagflation"] - -0.04).abs() < 1e-9);
    assert_eq!(results.len(), scenarios.len());

    let empty: BTreeMap<String, Scenario> = BTreeMap::new();
    assert!(stress_test(&weights, &series, &empty).unwrap().is_empty());
}

#[test]
fn test_config_drives_run() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[backtest]\ninitial_capital = 10000.0\nrebalance = \"quarterly\"\n\n\
         [optimizer]\nobjective = \"min-variance\"\nlookback = 60\n\n\
         [walk_forward]\ntrain_periods = 100\ntest_periods = 25"
    )
    .unwrap();
    let config = PathwiseConfig::load(file.path()).unwrap();

    let series = create_synthetic_series(250);
    let run = Backtester::new(config.to_backtest_config())
        .run(&series, &mut config.to_strategy())
        .unwrap();
    assert_eq!(run.initial_capital, 10_000.0);
    assert_eq!(run.strategy_name, "Minimum Variance");

    let wf = WalkForwardAnalyzer::new(config.to_walk_forward_config())
        .run(&series, &mut config.to_strategy())
        .unwrap();
    assert_eq!(wf.windows.len(), 6);
}
