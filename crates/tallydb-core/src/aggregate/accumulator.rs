//! Module: aggregate::accumulator
//! Responsibility: per-group running state for every aggregate function.
//! Does not own: grouping, expression evaluation, or plan validation.
//! Boundary: the executor feeds values in and takes one finalized value out.

use crate::{
    aggregate::{
        AggregateFunction,
        distinct::DistinctValues,
        numeric::{BitOp, Welford, bit_operand, finite_or_null},
    },
    value::{Value, canonical_cmp},
};
use std::{cmp::Ordering, collections::BTreeSet};

/// Partial value emitted by a poisoned shard state.
///
/// Every numeric coordinator fold rejects it, so poisoning survives a
/// two-phase merge instead of being mistaken for an empty shard.
pub const POISONED_PARTIAL: Value = Value::Bool(false);

///
/// Accumulator
///
/// Running state for one aggregate function inside one group.
///
/// `update` folds raw input values (or, for `*_STEP2` tags, shard partials).
/// `finalize` produces the group's output value exactly once.
/// `serialize_partial` / `merge_partial` expose the shard wire form of the
/// state so independent accumulators of the same function can be combined.
///

#[derive(Clone, Debug)]
pub struct Accumulator {
    function: AggregateFunction,
    state: AccumulatorState,
}

#[derive(Clone, Debug)]
enum AccumulatorState {
    Count(u64),
    Extreme {
        best: Option<Value>,
        keep: Ordering,
    },
    Sum {
        sum: f64,
        seen: bool,
        poisoned: bool,
    },
    Average {
        sum: f64,
        count: u64,
        poisoned: bool,
    },
    Variance {
        welford: Welford,
        poisoned: bool,
    },
    Unique(DistinctValues),
    SortedUnique(BTreeSet<Value>),
    Bits {
        op: BitOp,
        acc: Option<u32>,
        poisoned: bool,
    },
}

impl Accumulator {
    /// Build the empty state for one function tag.
    #[must_use]
    pub fn new(function: AggregateFunction) -> Self {
        use AggregateFunction as F;

        let state = match function {
            F::Length => AccumulatorState::Count(0),
            F::Min => AccumulatorState::Extreme {
                best: None,
                keep: Ordering::Less,
            },
            F::Max => AccumulatorState::Extreme {
                best: None,
                keep: Ordering::Greater,
            },
            F::Sum => AccumulatorState::Sum {
                sum: 0.0,
                seen: false,
                poisoned: false,
            },
            F::Average | F::AverageStep1 | F::AverageStep2 => AccumulatorState::Average {
                sum: 0.0,
                count: 0,
                poisoned: false,
            },
            F::VariancePopulation
            | F::VariancePopulationStep1
            | F::VariancePopulationStep2
            | F::VarianceSample
            | F::VarianceSampleStep1
            | F::VarianceSampleStep2
            | F::StddevPopulation
            | F::StddevPopulationStep1
            | F::StddevPopulationStep2
            | F::StddevSample
            | F::StddevSampleStep1
            | F::StddevSampleStep2 => AccumulatorState::Variance {
                welford: Welford::default(),
                poisoned: false,
            },
            F::Unique | F::UniqueStep2 | F::CountDistinct | F::CountDistinctStep2 => {
                AccumulatorState::Unique(DistinctValues::new())
            }
            F::SortedUnique | F::SortedUniqueStep2 => {
                AccumulatorState::SortedUnique(BTreeSet::new())
            }
            F::BitAnd => Self::bits(BitOp::And),
            F::BitOr => Self::bits(BitOp::Or),
            F::BitXor => Self::bits(BitOp::Xor),
        };

        Self { function, state }
    }

    const fn bits(op: BitOp) -> AccumulatorState {
        AccumulatorState::Bits {
            op,
            acc: None,
            poisoned: false,
        }
    }

    #[must_use]
    pub const fn function(&self) -> AggregateFunction {
        self.function
    }

    /// Whether a disqualifying input has already forced a null result.
    #[must_use]
    pub const fn is_poisoned(&self) -> bool {
        match self.state {
            AccumulatorState::Sum { poisoned, .. }
            | AccumulatorState::Average { poisoned, .. }
            | AccumulatorState::Variance { poisoned, .. }
            | AccumulatorState::Bits { poisoned, .. } => poisoned,
            _ => false,
        }
    }

    /// Fold one input value.
    pub fn update(&mut self, value: &Value) {
        use AggregateFunction as F;

        match self.function {
            F::AverageStep2
            | F::VariancePopulationStep2
            | F::VarianceSampleStep2
            | F::StddevPopulationStep2
            | F::StddevSampleStep2
            | F::UniqueStep2
            | F::SortedUniqueStep2
            | F::CountDistinctStep2 => self.merge_partial(value),
            _ => self.fold_raw(value),
        }
    }

    fn fold_raw(&mut self, value: &Value) {
        match &mut self.state {
            AccumulatorState::Count(count) => *count = count.saturating_add(1),
            AccumulatorState::Extreme { best, keep } => {
                if value.is_null() {
                    return;
                }
                let replace = best
                    .as_ref()
                    .is_none_or(|current| canonical_cmp(value, current) == *keep);
                if replace {
                    *best = Some(value.clone());
                }
            }
            AccumulatorState::Sum {
                sum,
                seen,
                poisoned,
            } => match value {
                Value::Null => {}
                Value::Number(n) => {
                    *sum += n;
                    *seen = true;
                }
                _ => *poisoned = true,
            },
            AccumulatorState::Average {
                sum,
                count,
                poisoned,
            } => match value {
                Value::Null => {}
                Value::Number(n) => {
                    *sum += n;
                    *count += 1;
                }
                _ => *poisoned = true,
            },
            AccumulatorState::Variance { welford, poisoned } => match value {
                Value::Null => {}
                Value::Number(n) => welford.push(*n),
                _ => *poisoned = true,
            },
            AccumulatorState::Unique(values) => {
                values.insert(value);
            }
            AccumulatorState::SortedUnique(values) => {
                if !values.contains(value) {
                    values.insert(value.clone());
                }
            }
            AccumulatorState::Bits { op, acc, poisoned } => {
                if value.is_null() {
                    return;
                }
                match bit_operand(value) {
                    Some(operand) => {
                        *acc = Some(acc.map_or(operand, |current| op.apply(current, operand)));
                    }
                    None => *poisoned = true,
                }
            }
        }
    }

    /// Fold a partial produced by `serialize_partial` of the same family.
    ///
    /// Malformed partials poison numeric states.
    pub fn merge_partial(&mut self, partial: &Value) {
        // Extremes, sums and bit folds accept their own partials as
        // ordinary inputs.
        if matches!(
            self.state,
            AccumulatorState::Extreme { .. }
                | AccumulatorState::Sum { .. }
                | AccumulatorState::Bits { .. }
        ) {
            self.fold_raw(partial);
            return;
        }

        match &mut self.state {
            AccumulatorState::Count(count) => {
                if let Some(n) = partial.as_number().filter(|n| *n >= 0.0) {
                    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let n = n as u64;
                    *count = count.saturating_add(n);
                }
            }
            AccumulatorState::Average {
                sum,
                count,
                poisoned,
            } => match partial_numbers::<2>(partial) {
                PartialShape::Empty => {}
                PartialShape::Parts([partial_sum, partial_count]) if partial_count >= 0.0 => {
                    *sum += partial_sum;
                    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                    let partial_count = partial_count as u64;
                    *count += partial_count;
                }
                _ => *poisoned = true,
            },
            AccumulatorState::Variance { welford, poisoned } => {
                match partial_numbers::<3>(partial) {
                    PartialShape::Empty => {}
                    PartialShape::Parts([partial_count, mean, m2]) if partial_count >= 0.0 => {
                        #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                        let partial_count = partial_count as u64;
                        welford.merge(&Welford::from_parts(partial_count, mean, m2));
                    }
                    _ => *poisoned = true,
                }
            }
            // Collection states read a non-array partial as one element.
            AccumulatorState::Unique(values) => match partial {
                Value::List(items) => {
                    for item in items {
                        values.insert(item);
                    }
                }
                other => {
                    values.insert(other);
                }
            },
            // Same non-array rule as `Unique`.
            AccumulatorState::SortedUnique(values) => match partial {
                Value::List(items) => values.extend(items.iter().cloned()),
                other => {
                    values.insert(other.clone());
                }
            },
            AccumulatorState::Extreme { .. }
            | AccumulatorState::Sum { .. }
            | AccumulatorState::Bits { .. } => {}
        }
    }

    /// Wire form of the current state, as emitted by a shard.
    #[must_use]
    pub fn serialize_partial(&self) -> Value {
        match &self.state {
            AccumulatorState::Count(count) => Value::from(*count),
            AccumulatorState::Extreme { best, .. } => best.clone().unwrap_or(Value::Null),
            AccumulatorState::Sum {
                sum,
                seen,
                poisoned,
            } => {
                if *poisoned {
                    POISONED_PARTIAL
                } else if *seen {
                    Value::Number(*sum)
                } else {
                    Value::Null
                }
            }
            AccumulatorState::Average {
                sum,
                count,
                poisoned,
            } => {
                if *poisoned {
                    POISONED_PARTIAL
                } else {
                    Value::List(vec![Value::Number(*sum), Value::from(*count)])
                }
            }
            AccumulatorState::Variance { welford, poisoned } => {
                if *poisoned {
                    POISONED_PARTIAL
                } else {
                    Value::List(vec![
                        Value::from(welford.count()),
                        Value::Number(welford.mean()),
                        Value::Number(welford.m2()),
                    ])
                }
            }
            AccumulatorState::Unique(values) => Value::List(values.values().to_vec()),
            AccumulatorState::SortedUnique(values) => {
                Value::List(values.iter().cloned().collect())
            }
            AccumulatorState::Bits { acc, poisoned, .. } => {
                if *poisoned {
                    POISONED_PARTIAL
                } else {
                    acc.map_or(Value::Null, Value::from)
                }
            }
        }
    }

    /// Produce the group's output value.
    #[must_use]
    pub fn finalize(self) -> Value {
        use AggregateFunction as F;

        match self.function {
            F::AverageStep1
            | F::VariancePopulationStep1
            | F::VarianceSampleStep1
            | F::StddevPopulationStep1
            | F::StddevSampleStep1 => return self.serialize_partial(),
            _ => {}
        }

        match self.state {
            AccumulatorState::Count(count) => Value::from(count),
            AccumulatorState::Extreme { best, .. } => best.unwrap_or(Value::Null),
            AccumulatorState::Sum {
                sum,
                seen,
                poisoned,
            } => {
                if poisoned || !seen {
                    Value::Null
                } else {
                    finite_or_null(sum)
                }
            }
            AccumulatorState::Average {
                sum,
                count,
                poisoned,
            } => {
                if poisoned || count == 0 {
                    Value::Null
                } else {
                    #[expect(clippy::cast_precision_loss)]
                    let mean = sum / count as f64;
                    finite_or_null(mean)
                }
            }
            AccumulatorState::Variance { welford, poisoned } => {
                if poisoned {
                    return Value::Null;
                }
                let variance = match self.function {
                    F::VarianceSample
                    | F::VarianceSampleStep2
                    | F::StddevSample
                    | F::StddevSampleStep2 => welford.variance_sample(),
                    _ => welford.variance_population(),
                };
                let stddev = matches!(
                    self.function,
                    F::StddevPopulation
                        | F::StddevPopulationStep2
                        | F::StddevSample
                        | F::StddevSampleStep2
                );

                variance
                    .map(|v| if stddev { v.sqrt() } else { v })
                    .map_or(Value::Null, finite_or_null)
            }
            AccumulatorState::Unique(values) => match self.function {
                F::CountDistinct | F::CountDistinctStep2 => Value::from(values.len() as u64),
                _ => Value::List(values.into_values()),
            },
            AccumulatorState::SortedUnique(values) => Value::List(values.into_iter().collect()),
            AccumulatorState::Bits { acc, poisoned, .. } => {
                if poisoned {
                    Value::Null
                } else {
                    acc.map_or(Value::Null, Value::from)
                }
            }
        }
    }
}

enum PartialShape<const N: usize> {
    Empty,
    Parts([f64; N]),
    Malformed,
}

// Read a fixed-width numeric array partial such as `[sum, count]`.
fn partial_numbers<const N: usize>(partial: &Value) -> PartialShape<N> {
    match partial {
        Value::Null => PartialShape::Empty,
        Value::List(items) if items.len() == N => {
            let mut parts = [0.0; N];
            for (slot, item) in parts.iter_mut().zip(items) {
                match item.as_number() {
                    Some(n) => *slot = n,
                    None => return PartialShape::Malformed,
                }
            }
            PartialShape::Parts(parts)
        }
        _ => PartialShape::Malformed,
    }
}
