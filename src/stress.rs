//! Scenario stress testing.
//!
//! A scenario either replays a historical date range of the return series or
//! applies an instantaneous shock per asset. Each evaluates to a single
//! portfolio return.

use crate::error::{PortfolioError, Result};
use crate::linalg::dot;
use crate::types::{validate_weights, ReturnSeries, WEIGHT_TOLERANCE};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A stress scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    /// Compound each asset's returns over `start..=end` (whole days).
    Historical { start: NaiveDate, end: NaiveDate },
    /// Fractional shock per asset name; unlisted assets are unshocked.
    Shock(BTreeMap<String, f64>),
}

impl Scenario {
    /// Portfolio return under this scenario.
    pub fn evaluate(&self, weights: &[f64], series: &ReturnSeries) -> Result<f64> {
        match self {
            Scenario::Historical { start, end } => {
                if end < start {
                    return Err(PortfolioError::invalid_input(format!(
                        "scenario ends ({}) before it starts ({})",
                        end, start
                    )));
                }
                let from = start
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| Utc.from_utc_datetime(&dt));
                let to = end
                    .and_hms_opt(23, 59, 59)
                    .map(|dt| Utc.from_utc_datetime(&dt));
                let (Some(from), Some(to)) = (from, to) else {
                    return Err(PortfolioError::invalid_input("invalid scenario dates"));
                };

                let period = series.between(from, to);
                if period.is_empty() {
                    warn!("No returns between {} and {}", start, end);
                }
                Ok(dot(weights, &period.cumulative_returns()))
            }
            Scenario::Shock(shocks) => {
                let vector: Vec<f64> = series
                    .assets()
                    .iter()
                    .map(|asset| shocks.get(asset).copied().unwrap_or(0.0))
                    .collect();
                Ok(dot(weights, &vector))
            }
        }
    }
}

/// Evaluate every scenario, rounding each portfolio return to four decimals.
pub fn stress_test(
    weights: &[f64],
    series: &ReturnSeries,
    scenarios: &BTreeMap<String, Scenario>,
) -> Result<BTreeMap<String, f64>> {
    validate_weights(weights, series.num_assets(), WEIGHT_TOLERANCE)?;
    scenarios
        .iter()
        .map(|(name, scenario)| {
            let value = scenario.evaluate(weights, series)?;
            Ok((name.clone(), round4(value)))
        })
        .collect()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn shock(entries: [(&str, f64); 4]) -> Scenario {
    Scenario::Shock(
        entries
            .into_iter()
            .map(|(asset, value)| (asset.to_string(), value))
            .collect(),
    )
}

fn date_range(start: (i32, u32, u32), end: (i32, u32, u32)) -> Option<Scenario> {
    Some(Scenario::Historical {
        start: NaiveDate::from_ymd_opt(start.0, start.1, start.2)?,
        end: NaiveDate::from_ymd_opt(end.0, end.1, end.2)?,
    })
}

/// Predefined macro shocks keyed on asset-class names
/// (`equities`, `bonds`, `commodities`, `gold`).
pub fn hypothetical_scenarios() -> BTreeMap<String, Scenario> {
    [
        (
            "Stagflation",
            shock([("equities", -0.20), ("bonds", -0.05), ("commodities", 0.15), ("gold", 0.25)]),
        ),
        (
            "Rate Shock (+200bps)",
            shock([("equities", -0.15), ("bonds", -0.10), ("commodities", 0.05), ("gold", -0.03)]),
        ),
        (
            "Deflationary Bust",
            shock([("equities", -0.30), ("bonds", 0.15), ("commodities", -0.20), ("gold", 0.10)]),
        ),
        (
            "Dollar Crisis",
            shock([("equities", -0.10), ("bonds", -0.05), ("commodities", 0.20), ("gold", 0.30)]),
        ),
    ]
    .into_iter()
    .map(|(name, scenario)| (name.to_string(), scenario))
    .collect()
}

/// Predefined historical crisis windows.
pub fn historical_scenarios() -> BTreeMap<String, Scenario> {
    [
        ("COVID Crash", date_range((2020, 2, 19), (2020, 3, 23))),
        ("GFC", date_range((2008, 9, 15), (2009, 3, 9))),
        ("Dot-Com Bust", date_range((2000, 3, 10), (2002, 10, 9))),
        ("2022 Rate Shock", date_range((2022, 1, 3), (2022, 10, 12))),
    ]
    .into_iter()
    .filter_map(|(name, scenario)| scenario.map(|s| (name.to_string(), s)))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn asset_class_series() -> ReturnSeries {
        let start = Utc.with_ymd_and_hms(2020, 2, 18, 0, 0, 0).unwrap();
        ReturnSeries::new(
            ["equities", "bonds", "commodities", "gold"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            (0..4).map(|i| start + Duration::days(i)).collect(),
            vec![
                vec![0.50, 0.0, 0.0, 0.0],
                vec![-0.10, 0.01, 0.0, 0.02],
                vec![-0.10, 0.01, 0.0, 0.02],
                vec![0.30, 0.0, 0.0, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_hypothetical_shocks() {
        let series = asset_class_series();
        let weights = [0.6, 0.4, 0.0, 0.0];
        let results = stress_test(&weights, &series, &hypothetical_scenarios()).unwrap();

        assert_eq!(results.len(), 4);
        assert!((results["Stagflation"] - (-0.14)).abs() < 1e-12);
        assert!((results["Deflationary Bust"] - (-0.12)).abs() < 1e-12);
    }

    #[test]
    fn test_historical_window_compounds() {
        let series = asset_class_series();
        let mut scenarios = BTreeMap::new();
        scenarios.insert(
            "Two Days".to_string(),
            date_range((2020, 2, 19), (2020, 2, 20)).unwrap(),
        );
        let equities = stress_test(&[1.0, 0.0, 0.0, 0.0], &series, &scenarios).unwrap();
        let bonds = stress_test(&[0.0, 1.0, 0.0, 0.0], &series, &scenarios).unwrap();

        // 0.9 * 0.9 - 1 and 1.01 * 1.01 - 1
        assert!((equities["Two Days"] + 0.19).abs() < 1e-12);
        assert!((bonds["Two Days"] - 0.0201).abs() < 1e-12);
    }

    #[test]
    fn test_missing_asset_is_unshocked() {
        let series = asset_class_series();
        let mut shocks = BTreeMap::new();
        shocks.insert("equities".to_string(), -0.5);
        shocks.insert("crypto".to_string(), -0.9);
        let mut scenarios = BTreeMap::new();
        scenarios.insert("Crash".to_string(), Scenario::Shock(shocks));

        let results = stress_test(&[0.5, 0.5, 0.0, 0.0], &series, &scenarios).unwrap();
        assert_eq!(results["Crash"], -0.25);
    }

    #[test]
    fn test_out_of_range_history_is_flat() {
        let series = asset_class_series();
        let results = stress_test(&[0.25; 4], &series, &historical_scenarios()).unwrap();
        assert_eq!(results["GFC"], 0.0);
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round4(0.123_456), 0.1235);
        assert_eq!(round4(-0.000_04), -0.0);
    }

    #[test]
    fn test_weight_length_checked() {
        let series = asset_class_series();
        assert!(stress_test(&[1.0], &series, &hypothetical_scenarios()).is_err());
    }

    #[test]
    fn test_scenario_serde() {
        let json = serde_json::to_string(&historical_scenarios()).unwrap();
        let back: BTreeMap<String, Scenario> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, historical_scenarios());
    }
}
