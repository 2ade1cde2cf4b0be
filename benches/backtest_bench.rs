//! Performance benchmarks for the simulator, optimizer, and risk engine.
//!
//! Run with: cargo bench

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pathwise::engine::{BacktestConfig, Backtester};
use pathwise::optimizer::{optimize, Objective};
use pathwise::risk::{calculate_var, monte_carlo_portfolio, MonteCarloConfig, VarMethod};
use pathwise::strategies::{EqualWeight, OptimizedAllocation};
use pathwise::types::{RebalanceFrequency, ReturnSeries};
use pathwise::walkforward::{WalkForwardAnalyzer, WalkForwardConfig};

/// Generate a synthetic daily return series for benchmarking.
fn generate_series(periods: usize, assets: usize) -> ReturnSeries {
    let start = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
    let rows = (0..periods)
        .map(|i| {
            (0..assets)
                .map(|k| {
                    let x = i as f64 * (0.3 + 0.17 * k as f64);
                    0.0003 + 0.01 * (1.0 + k as f64 * 0.2) * x.sin()
                })
                .collect()
        })
        .collect();
    ReturnSeries::new(
        (0..assets).map(|k| format!("asset_{}", k)).collect(),
        (0..periods).map(|i| start + Duration::days(i as i64)).collect(),
        rows,
    )
    .unwrap()
}

/// Benchmark the backtest simulator.
fn bench_backtest(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest");

    for periods in [252, 1260, 2520].iter() {
        let series = generate_series(*periods, 5);
        group.bench_with_input(
            BenchmarkId::new("equal_weight_daily", periods),
            &series,
            |b, series| {
                let backtester = Backtester::new(
                    BacktestConfig::default().with_rebalance(RebalanceFrequency::Daily),
                );
                b.iter(|| backtester.run(black_box(series), &mut EqualWeight))
            },
        );
    }

    let series = generate_series(1260, 5);
    group.bench_function("min_variance_monthly_1260", |b| {
        let backtester = Backtester::new(BacktestConfig::default());
        b.iter(|| {
            let mut strategy = OptimizedAllocation::new(Objective::MinVariance).with_lookback(252);
            backtester.run(black_box(&series), &mut strategy)
        })
    });

    group.finish();
}

/// Benchmark the optimizer objectives.
fn bench_optimizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimizer");

    for assets in [3, 10, 25].iter() {
        let view_source = generate_series(500, *assets);
        let view = view_source.view();
        let mu = view.mean_returns();
        let cov = view.covariance();

        for objective in [Objective::MinVariance, Objective::MaxSharpe, Objective::RiskParity] {
            group.bench_with_input(
                BenchmarkId::new(objective.name(), assets),
                &(&mu, &cov),
                |b, (mu, cov)| b.iter(|| optimize(black_box(mu), black_box(cov), 0.0, objective)),
            );
        }
    }

    group.finish();
}

/// Benchmark VaR methods and the Monte Carlo projection.
fn bench_risk(c: &mut Criterion) {
    let series = generate_series(1000, 4);
    let weights = vec![0.25; 4];
    let returns = series.view().portfolio_returns(&weights);

    let mut group = c.benchmark_group("risk");

    group.bench_function("var_historical", |b| {
        b.iter(|| calculate_var(black_box(&returns), 0.95, &VarMethod::Historical))
    });
    group.bench_function("var_parametric", |b| {
        b.iter(|| calculate_var(black_box(&returns), 0.95, &VarMethod::Parametric))
    });
    group.bench_function("var_monte_carlo_100k", |b| {
        b.iter(|| calculate_var(black_box(&returns), 0.95, &VarMethod::monte_carlo_seeded(1)))
    });

    let config = MonteCarloConfig::default().with_seed(42);
    group.bench_function("portfolio_projection_10k", |b| {
        b.iter(|| monte_carlo_portfolio(black_box(&weights), &series.view(), &config))
    });

    group.finish();
}

/// Benchmark sequential vs parallel walk-forward evaluation.
fn bench_walkforward(c: &mut Criterion) {
    let series = generate_series(2520, 5);
    let analyzer = WalkForwardAnalyzer::new(WalkForwardConfig::new(252, 63));

    let mut group = c.benchmark_group("walkforward");
    group.sample_size(20);

    group.bench_function("sequential", |b| {
        b.iter(|| {
            let mut strategy = OptimizedAllocation::new(Objective::MinVariance);
            analyzer.run(black_box(&series), &mut strategy)
        })
    });
    group.bench_function("parallel", |b| {
        b.iter(|| {
            analyzer.run_parallel(black_box(&series), || {
                OptimizedAllocation::new(Objective::MinVariance)
            })
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_backtest,
    bench_optimizer,
    bench_risk,
    bench_walkforward
);
criterion_main!(benches);
