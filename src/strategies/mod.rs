//! Ready-to-use allocation strategies.
//!
//! - [`EqualWeight`]: 1/N across the universe
//! - [`FixedWeights`]: a constant target mix
//! - [`OptimizedAllocation`]: re-optimizes on trailing history at every rebalance
//! - [`BlackLittermanAllocation`]: optimizes on Black-Litterman posterior returns

mod fixed;
mod optimized;

pub use fixed::{EqualWeight, FixedWeights};
pub use optimized::{BlackLittermanAllocation, OptimizedAllocation};
