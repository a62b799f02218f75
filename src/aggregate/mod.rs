//! Aggregation stage: group observations by month, country and product.
//!
//! - running sums per cell (`accumulator`)
//! - the single-pass aggregator and its World rollup (`aggregator`)

pub mod accumulator;
pub mod aggregator;

pub use accumulator::*;
pub use aggregator::*;
