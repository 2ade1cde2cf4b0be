//! Performance metrics of a portfolio value series.

use crate::stats::{mean, percentile, ratio_or_zero, sample_std};
use crate::types::{ValuePoint, PERIODS_PER_YEAR};
use serde::{Deserialize, Serialize};

/// Summary statistics of a value series.
///
/// Ratios whose denominator is zero or undefined are reported as 0.0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Returns
    pub total_return: f64,
    pub cagr: f64,

    // Risk
    pub volatility: f64,
    pub max_drawdown: f64,
    pub var_95: f64,
    pub cvar_95: f64,

    // Risk-adjusted returns
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,

    // Consistency
    pub win_rate: f64,
    /// Number of period returns the metrics were computed from.
    pub periods: usize,
}

impl PerformanceMetrics {
    /// Metrics of a value series with an annual risk-free rate.
    pub fn from_values(values: &[f64], risk_free_rate: f64) -> Self {
        let returns = period_returns(values);
        if returns.is_empty() {
            return Self {
                max_drawdown: max_drawdown(values),
                ..Default::default()
            };
        }

        let first = values[0];
        let last = values[values.len() - 1];
        let total_return = if first > 0.0 { last / first - 1.0 } else { 0.0 };

        let years = returns.len() as f64 / PERIODS_PER_YEAR;
        let cagr = (1.0 + total_return).max(0.0).powf(1.0 / years) - 1.0;

        let annualizer = PERIODS_PER_YEAR.sqrt();
        let std = sample_std(&returns);
        let excess = mean(&returns) - risk_free_rate / PERIODS_PER_YEAR;

        let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();

        let var_95 = -percentile(&returns, 0.05);
        let tail: Vec<f64> = returns.iter().copied().filter(|&r| r <= -var_95).collect();
        let cvar_95 = if tail.is_empty() { var_95 } else { -mean(&tail) };

        Self {
            total_return,
            cagr,
            volatility: std.unwrap_or(0.0) * annualizer,
            max_drawdown: max_drawdown(values),
            var_95,
            cvar_95,
            sharpe_ratio: ratio_or_zero(excess, std) * annualizer,
            sortino_ratio: ratio_or_zero(excess, sample_std(&downside)) * annualizer,
            win_rate: returns.iter().filter(|&&r| r > 0.0).count() as f64 / returns.len() as f64,
            periods: returns.len(),
        }
    }

    /// Metrics of a timestamped value series.
    pub fn from_points(points: &[ValuePoint], risk_free_rate: f64) -> Self {
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        Self::from_values(&values, risk_free_rate)
    }

    /// Display-ready labels and values.
    pub fn formatted(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total Return", format_pct(self.total_return)),
            ("CAGR", format_pct(self.cagr)),
            ("Volatility", format_pct(self.volatility)),
            ("Sharpe Ratio", format!("{:.2}", self.sharpe_ratio)),
            ("Sortino Ratio", format!("{:.2}", self.sortino_ratio)),
            ("Max Drawdown", format_pct(self.max_drawdown)),
            ("VaR (95%)", format_pct(self.var_95)),
            ("CVaR (95%)", format_pct(self.cvar_95)),
            ("Win Rate", format_pct(self.win_rate)),
        ]
    }

    pub fn summary(&self) -> String {
        let width = 14;
        let mut out = format!("Performance ({} periods)\n", self.periods);
        for (label, value) in self.formatted() {
            out.push_str(&format!("  {:<width$} {:>10}\n", label, value, width = width));
        }
        out
    }
}

/// Signed two-decimal percentage, e.g. `+12.34%`.
pub fn format_pct(fraction: f64) -> String {
    format!("{:+.2}%", fraction * 100.0)
}

/// Simple returns between consecutive values, skipping periods with no base.
fn period_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Deepest decline from a running peak, as a non-positive fraction.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for &v in values {
        peak = peak.max(v);
        if peak > 0.0 {
            worst = worst.min(v / peak - 1.0);
        }
    }
    worst
}
