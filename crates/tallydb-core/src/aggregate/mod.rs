//! Aggregate functions: the tag vocabulary and the per-group fold state.

mod accumulator;
mod distinct;
mod function;
pub(crate) mod numeric;


pub use accumulator::{Accumulator, POISONED_PARTIAL};
pub use distinct::DistinctValues;
pub use function::{AggregateFunction, AggregateSplit, FunctionPhase};
pub use numeric::Welford;
