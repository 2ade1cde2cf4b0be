//! Allocation strategy trait.

use crate::error::Result;
use crate::types::ReturnView;
use chrono::{DateTime, Utc};

/// A rule that assigns portfolio weights at each rebalance point.
///
/// The simulator calls [`allocate`](AllocationStrategy::allocate) with the
/// return history up to and including the rebalance timestamp. The returned
/// vector must have one finite entry per asset and sum to one.
///
/// Any closure `FnMut(&ReturnView, DateTime<Utc>) -> Result<Vec<f64>>` is a
/// strategy:
///
/// ```
/// use chrono::{DateTime, Utc};
/// use pathwise::strategy::AllocationStrategy;
/// use pathwise::types::ReturnView;
///
/// let sixty_forty =
///     |_h: &ReturnView<'_>, _t: DateTime<Utc>| -> pathwise::Result<Vec<f64>> { Ok(vec![0.6, 0.4]) };
/// assert_eq!(sixty_forty.name(), "custom");
/// ```
pub trait AllocationStrategy {
    /// Returns the name of the strategy.
    fn name(&self) -> &str {
        "custom"
    }

    /// Called once at the start of each run.
    fn init(&mut self) {}

    /// Target weights for the period starting at `as_of`.
    fn allocate(&mut self, history: &ReturnView<'_>, as_of: DateTime<Utc>) -> Result<Vec<f64>>;

    /// Get strategy parameters as key-value pairs for logging.
    fn parameters(&self) -> Vec<(String, String)> {
        vec![]
    }
}

impl<F> AllocationStrategy for F
where
    F: FnMut(&ReturnView<'_>, DateTime<Utc>) -> Result<Vec<f64>>,
{
    fn allocate(&mut self, history: &ReturnView<'_>, as_of: DateTime<Utc>) -> Result<Vec<f64>> {
        self(history, as_of)
    }
}
