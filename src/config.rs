//! Configuration file support.
//!
//! Allows loading backtest, optimizer, risk, and walk-forward settings from a
//! TOML file for reproducibility. Every section and key is optional.

use crate::engine::BacktestConfig;
use crate::error::{PortfolioError, Result};
use crate::optimizer::{Objective, OptimizerSettings};
use crate::risk::{MonteCarloConfig, VarMethod, DEFAULT_VAR_SAMPLES};
use crate::strategies::OptimizedAllocation;
use crate::types::{RebalanceFrequency, WEIGHT_TOLERANCE};
use crate::walkforward::WalkForwardConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Complete configuration loaded from a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathwiseConfig {
    #[serde(default)]
    pub backtest: BacktestSettings,
    #[serde(default)]
    pub optimizer: OptimizerFileSettings,
    #[serde(default)]
    pub risk: RiskSettings,
    #[serde(default)]
    pub walk_forward: WalkForwardSettings,
}

/// Backtest simulator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSettings {
    #[serde(default = "default_capital")]
    pub initial_capital: f64,
    /// Cost per unit of turnover (0.001 = 10 bps).
    #[serde(default = "default_cost_rate")]
    pub cost_rate: f64,
    #[serde(default)]
    pub rebalance: RebalanceFrequency,
    #[serde(default = "default_weight_tolerance")]
    pub weight_tolerance: f64,
}

fn default_capital() -> f64 {
    1_000_000.0
}

fn default_cost_rate() -> f64 {
    0.001
}

fn default_weight_tolerance() -> f64 {
    WEIGHT_TOLERANCE
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_capital: default_capital(),
            cost_rate: default_cost_rate(),
            rebalance: RebalanceFrequency::default(),
            weight_tolerance: default_weight_tolerance(),
        }
    }
}

/// Optimizer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerFileSettings {
    #[serde(default = "default_objective")]
    pub objective: Objective,
    /// Annual risk-free rate.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
    /// Trailing periods used for estimation (all history when absent).
    #[serde(default)]
    pub lookback: Option<usize>,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_objective() -> Objective {
    Objective::MaxSharpe
}

fn default_risk_free_rate() -> f64 {
    0.045
}

fn default_max_iterations() -> usize {
    200
}

impl Default for OptimizerFileSettings {
    fn default() -> Self {
        Self {
            objective: default_objective(),
            risk_free_rate: default_risk_free_rate(),
            lookback: None,
            max_iterations: default_max_iterations(),
        }
    }
}

/// VaR estimator named in the `[risk]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VarMethodKind {
    #[default]
    Historical,
    Parametric,
    MonteCarlo,
}

/// Risk engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSettings {
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// "historical", "parametric", or "monte-carlo".
    #[serde(default)]
    pub var_method: VarMethodKind,
    #[serde(default = "default_var_samples")]
    pub var_samples: usize,
    #[serde(default = "default_simulations")]
    pub num_simulations: usize,
    #[serde(default = "default_horizon")]
    pub horizon_days: usize,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_confidence() -> f64 {
    0.95
}

fn default_var_samples() -> usize {
    DEFAULT_VAR_SAMPLES
}

fn default_simulations() -> usize {
    10_000
}

fn default_horizon() -> usize {
    252
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            confidence: default_confidence(),
            var_method: VarMethodKind::default(),
            var_samples: default_var_samples(),
            num_simulations: default_simulations(),
            horizon_days: default_horizon(),
            seed: None,
        }
    }
}

/// Walk-forward settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardSettings {
    #[serde(default = "default_train")]
    pub train_periods: usize,
    #[serde(default = "default_test")]
    pub test_periods: usize,
}

fn default_train() -> usize {
    252
}

fn default_test() -> usize {
    63
}

impl Default for WalkForwardSettings {
    fn default() -> Self {
        Self {
            train_periods: default_train(),
            test_periods: default_test(),
        }
    }
}

impl PathwiseConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let config: PathwiseConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no run could use.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(PortfolioError::ConfigError(msg.to_string()));

        if !(self.backtest.initial_capital > 0.0) {
            return fail("backtest.initial_capital must be positive");
        }
        if !(self.backtest.cost_rate >= 0.0) {
            return fail("backtest.cost_rate must be non-negative");
        }
        if !(self.risk.confidence > 0.0 && self.risk.confidence < 1.0) {
            return fail("risk.confidence must lie in (0, 1)");
        }
        if self.risk.num_simulations == 0 || self.risk.horizon_days == 0 {
            return fail("risk.num_simulations and risk.horizon_days must be positive");
        }
        if self.walk_forward.train_periods == 0 || self.walk_forward.test_periods == 0 {
            return fail("walk_forward periods must be positive");
        }
        if self.optimizer.max_iterations == 0 {
            return fail("optimizer.max_iterations must be positive");
        }
        Ok(())
    }

    pub fn to_backtest_config(&self) -> BacktestConfig {
        BacktestConfig {
            initial_capital: self.backtest.initial_capital,
            cost_rate: self.backtest.cost_rate,
            rebalance: self.backtest.rebalance,
            weight_tolerance: self.backtest.weight_tolerance,
        }
    }

    pub fn to_optimizer_settings(&self) -> OptimizerSettings {
        OptimizerSettings::default().with_max_iterations(self.optimizer.max_iterations)
    }

    /// Optimizer-backed strategy described by the `[optimizer]` section.
    pub fn to_strategy(&self) -> OptimizedAllocation {
        let strategy = OptimizedAllocation::new(self.optimizer.objective)
            .with_risk_free_rate(self.optimizer.risk_free_rate)
            .with_settings(self.to_optimizer_settings());
        match self.optimizer.lookback {
            Some(n) => strategy.with_lookback(n),
            None => strategy,
        }
    }

    /// VaR estimator described by the `[risk]` section.
    pub fn var_method(&self) -> VarMethod {
        match self.risk.var_method {
            VarMethodKind::Historical => VarMethod::Historical,
            VarMethodKind::Parametric => VarMethod::Parametric,
            VarMethodKind::MonteCarlo => VarMethod::MonteCarlo {
                samples: self.risk.var_samples,
                seed: self.risk.seed,
            },
        }
    }

    pub fn to_monte_carlo_config(&self) -> MonteCarloConfig {
        MonteCarloConfig {
            num_simulations: self.risk.num_simulations,
            horizon_days: self.risk.horizon_days,
            confidence_level: self.risk.confidence,
            seed: self.risk.seed,
        }
    }

    pub fn to_walk_forward_config(&self) -> WalkForwardConfig {
        WalkForwardConfig::new(
            self.walk_forward.train_periods,
            self.walk_forward.test_periods,
        )
    }

    /// Generate an example configuration file content.
    pub fn example() -> String {
        r#"# Pathwise Configuration File

[backtest]
initial_capital = 1000000.0
cost_rate = 0.001          # 10 bps per unit of turnover
rebalance = "monthly"      # daily, weekly, monthly, quarterly, yearly, never

[optimizer]
objective = "max-sharpe"   # max-sharpe, min-variance, risk-parity
risk_free_rate = 0.045
lookback = 252
max_iterations = 200

[risk]
confidence = 0.95
var_method = "historical"  # historical, parametric, monte-carlo
var_samples = 100000
num_simulations = 10000
horizon_days = 252
# seed = 42

[walk_forward]
train_periods = 252
test_periods = 63
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = PathwiseConfig::default();
        assert_eq!(config.backtest.initial_capital, 1_000_000.0);
        assert_eq!(config.backtest.rebalance, RebalanceFrequency::Monthly);
        assert_eq!(config.optimizer.objective, Objective::MaxSharpe);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config() {
        let toml_content = r#"
[backtest]
initial_capital = 50000.0
rebalance = "quarterly"

[optimizer]
objective = "risk-parity"
lookback = 126

[risk]
var_method = "monte-carlo"
seed = 7

[walk_forward]
train_periods = 100
test_periods = 20
"#;
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", toml_content).unwrap();

        let config = PathwiseConfig::load(file.path()).unwrap();
        assert_eq!(config.backtest.initial_capital, 50000.0);
        assert_eq!(config.backtest.rebalance, RebalanceFrequency::Quarterly);
        assert!((config.backtest.cost_rate - 0.001).abs() < 1e-12);
        assert_eq!(config.optimizer.objective, Objective::RiskParity);
        assert_eq!(config.optimizer.lookback, Some(126));
        assert_eq!(
            config.var_method(),
            VarMethod::MonteCarlo {
                samples: DEFAULT_VAR_SAMPLES,
                seed: Some(7)
            }
        );
        assert_eq!(config.to_walk_forward_config().train_periods, 100);
        assert_eq!(config.to_backtest_config().initial_capital, 50000.0);
    }

    #[test]
    fn test_example_parses() {
        let config: PathwiseConfig = toml::from_str(&PathwiseConfig::example()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.optimizer.lookback, Some(252));
    }

    #[test]
    fn test_save_roundtrip() {
        let mut config = PathwiseConfig::default();
        config.risk.seed = Some(99);
        config.backtest.rebalance = RebalanceFrequency::Weekly;

        let file = NamedTempFile::new().unwrap();
        config.save(file.path()).unwrap();
        let loaded = PathwiseConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[risk]\nconfidence = 1.5").unwrap();
        assert!(matches!(
            PathwiseConfig::load(file.path()),
            Err(PortfolioError::ConfigError(_))
        ));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[risk]\nvar_method = \"garch\"").unwrap();
        assert!(matches!(
            PathwiseConfig::load(file.path()),
            Err(PortfolioError::TomlError(_))
        ));
    }

    #[test]
    fn test_var_method_names() {
        for (name, kind) in [
            ("historical", VarMethodKind::Historical),
            ("parametric", VarMethodKind::Parametric),
            ("monte-carlo", VarMethodKind::MonteCarlo),
        ] {
            let config: PathwiseConfig =
                toml::from_str(&format!("[risk]\nvar_method = \"{}\"", name)).unwrap();
            assert_eq!(config.risk.var_method, kind);
        }
        let mut config = PathwiseConfig::default();
        assert_eq!(config.var_method(), VarMethod::Historical);
        config.risk.var_method = VarMethodKind::Parametric;
        assert_eq!(config.var_method(), VarMethod::Parametric);
    }
}
