//! Static allocation strategies.

use crate::error::Result;
use crate::strategy::AllocationStrategy;
use crate::types::{equal_weights, validate_weights, ReturnView, WEIGHT_TOLERANCE};
use chrono::{DateTime, Utc};

/// Equal weight across every asset in the history.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualWeight;

impl AllocationStrategy for EqualWeight {
    fn name(&self) -> &str {
        "Equal Weight"
    }

    fn allocate(&mut self, history: &ReturnView<'_>, _as_of: DateTime<Utc>) -> Result<Vec<f64>> {
        Ok(equal_weights(history.num_assets()))
    }
}

/// A constant target mix, restored at every rebalance.
#[derive(Debug, Clone)]
pub struct FixedWeights {
    weights: Vec<f64>,
}

impl FixedWeights {
    /// Create a fixed-mix strategy; the weights must sum to one.
    pub fn new(weights: Vec<f64>) -> Result<Self> {
        validate_weights(&weights, weights.len(), WEIGHT_TOLERANCE)?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl AllocationStrategy for FixedWeights {
    fn name(&self) -> &str {
        "Fixed Weights"
    }

    fn allocate(&mut self, _history: &ReturnView<'_>, _as_of: DateTime<Utc>) -> Result<Vec<f64>> {
        Ok(self.weights.clone())
    }

    fn parameters(&self) -> Vec<(String, String)> {
        vec![("weights".to_string(), format!("{:?}", self.weights))]
    }
}
