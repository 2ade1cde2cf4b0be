//! Example: Walk-Forward Analysis
//!
//! Walk-forward analysis guards against overfitting an allocation rule:
//! 1. Split history into rolling train/test windows
//! 2. Choose weights from the training rows only
//! 3. Hold those weights over the following test rows
//! 4. Roll forward and repeat
//!
//! Run with: cargo run --example walkforward [prices.csv]

use chrono::{Duration, TimeZone, Utc};
use pathwise::data::load_returns_csv;
use pathwise::engine::{BacktestConfig, Backtester};
use pathwise::optimizer::Objective;
use pathwise::risk::{calculate_cvar, calculate_var, VarMethod};
use pathwise::strategies::{EqualWeight, OptimizedAllocation};
use pathwise::stress::{hypothetical_scenarios, stress_test};
use pathwise::types::{RebalanceFrequency, ReturnSeries};
use pathwise::walkforward::{WalkForwardAnalyzer, WalkForwardConfig};
use tracing_subscriber::EnvFilter;

/// Generate synthetic daily returns with regime changes.
fn generate_synthetic_series(days: usize) -> ReturnSeries {
    let start = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
    let rows = (0..days)
        .map(|i| {
            let x = i as f64;
            // Equity drift flips between regimes
            let equity_drift = if (i / 250) % 2 == 0 { 0.0006 } else { -0.0002 };
            vec![
                equity_drift + 0.012 * (x * 0.7).sin(),
                0.0002 + 0.003 * (x * 1.3).cos(),
                0.0002 + 0.010 * (x * 0.3).sin() * (x * 1.1).cos(),
                0.0003 + 0.008 * (x * 0.5 + 1.0).sin(),
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
    .expect("synthetic series is well formed")
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pathwise=info".parse().unwrap()))
        .init();

    println!("=== Walk-Forward Analysis ===\n");

    // 1. Load data
    println!("1. Loading data...");
    let series = match std::env::args().nth(1) {
        Some(path) => load_returns_csv(&path).expect("Failed to load prices"),
        None => {
            println!("   Using synthetic data");
            generate_synthetic_series(1500)
        }
    };
    println!(
        "   Loaded {} periods for {} assets\n",
        series.len(),
        series.num_assets()
    );

    // 2. Configure walk-forward analysis
    println!("2. Configuring walk-forward analysis...");
    let config = WalkForwardConfig::new(252, 63);
    println!("   Train periods: {}", config.train_periods);
    println!("   Test periods:  {}", config.test_periods);
    println!("   Windows:       {}\n", config.window_count(series.len()));
    let analyzer = WalkForwardAnalyzer::new(config);

    // 3. Evaluate each objective out of sample
    println!("3. Running walk-forward analysis...");
    for objective in [Objective::MinVariance, Objective::RiskParity, Objective::MaxSharpe] {
        let result = analyzer
            .run_parallel(&series, || {
                OptimizedAllocation::new(objective).with_risk_free_rate(0.02)
            })
            .expect("Walk-forward analysis failed");

        println!("\n{}", "=".repeat(70));
        println!("{}", objective.name());
        for window in &result.windows {
            println!(
                "  Window {:>2}: {} -> {}  {:>8.2}% return, {:>6.2} Sharpe",
                window.window.index + 1,
                window.window.test_start_time.format("%Y-%m-%d"),
                window.window.test_end_time.format("%Y-%m-%d"),
                window.compounded_return * 100.0,
                window.sharpe
            );
        }
        println!("\n{}", result.summary());
        if result.is_robust(0.5) {
            println!("   PASSED: positive out-of-sample returns in most windows");
        } else {
            println!("   FAILED: allocation rule may be overfit");
        }
    }

    // 4. Compare with a full-period backtest
    println!("\n{}", "=".repeat(70));
    println!("\n4. Full-period backtests (quarterly rebalance)...\n");
    let backtester = Backtester::new(
        BacktestConfig::default()
            .with_initial_capital(100_000.0)
            .with_rebalance(RebalanceFrequency::Quarterly),
    );

    let equal = backtester
        .run(&series, &mut EqualWeight)
        .expect("Backtest failed");
    let mut optimized = OptimizedAllocation::new(Objective::MinVariance).with_lookback(252);
    let min_var = backtester
        .run(&series, &mut optimized)
        .expect("Backtest failed");

    for run in [&equal, &min_var] {
        println!("{}", run.strategy_name);
        println!("{}\n", run.metrics(0.02).summary());
    }

    // 5. Tail risk of the final allocation
    println!("5. Tail risk of the minimum-variance mix...");
    let weights = min_var
        .rebalances
        .last()
        .map(|event| event.weights.clone())
        .unwrap_or_else(|| vec![1.0 / series.num_assets() as f64; series.num_assets()]);
    let returns = series.view().portfolio_returns(&weights);
    let var = calculate_var(&returns, 0.95, &VarMethod::Historical).expect("VaR failed");
    let cvar = calculate_cvar(&returns, 0.95).expect("CVaR failed");
    println!("   Daily VaR (95%):  {:.2}%", var * 100.0);
    println!("   Daily CVaR (95%): {:.2}%", cvar * 100.0);

    if let Ok(results) = stress_test(&weights, &series, &hypothetical_scenarios()) {
        println!("\n   Stress scenarios:");
        for (name, value) in results {
            println!("   {:<28} {:>8.2}%", name, value * 100.0);
        }
    }
}
