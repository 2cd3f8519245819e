//! Module: scalar
//! Responsibility: array-argument counterparts of the aggregate functions.
//! Does not own: accumulator semantics (these fold through `Accumulator`).
//! Boundary: one value in, one value out; non-array arguments yield null.

use crate::{
    aggregate::{Accumulator, AggregateFunction},
    value::Value,
};

// Fold every element of an array through one accumulator.
fn fold(function: AggregateFunction, arg: &Value) -> Option<Accumulator> {
    let items = arg.as_list()?;
    let mut accumulator = Accumulator::new(function);
    for item in items {
        accumulator.update(item);
    }

    Some(accumulator)
}

fn apply(function: AggregateFunction, arg: &Value) -> Value {
    fold(function, arg).map_or(Value::Null, Accumulator::finalize)
}

#[must_use]
pub fn length(arg: &Value) -> Value {
    apply(AggregateFunction::Length, arg)
}

#[must_use]
pub fn min(arg: &Value) -> Value {
    apply(AggregateFunction::Min, arg)
}

#[must_use]
pub fn max(arg: &Value) -> Value {
    apply(AggregateFunction::Max, arg)
}

/// Sum of the numeric elements.
///
/// Unlike the aggregate, an array with nulls only (or nothing) sums to 0.
/// Any other non-numeric element, or a non-finite total, makes the result
/// null.
#[must_use]
pub fn sum(arg: &Value) -> Value {
    let Some(acc) = fold(AggregateFunction::Sum, arg) else {
        return Value::Null;
    };
    let has_numbers = arg
        .as_list()
        .is_some_and(|items| items.iter().any(|item| item.as_number().is_some()));

    if acc.is_poisoned() {
        Value::Null
    } else if has_numbers {
        acc.finalize()
    } else {
        Value::from(0)
    }
}

#[must_use]
pub fn average(arg: &Value) -> Value {
    apply(AggregateFunction::Average, arg)
}

#[must_use]
pub fn variance_population(arg: &Value) -> Value {
    apply(AggregateFunction::VariancePopulation, arg)
}

#[must_use]
pub fn variance_sample(arg: &Value) -> Value {
    apply(AggregateFunction::VarianceSample, arg)
}

#[must_use]
pub fn stddev_population(arg: &Value) -> Value {
    apply(AggregateFunction::StddevPopulation, arg)
}

#[must_use]
pub fn stddev_sample(arg: &Value) -> Value {
    apply(AggregateFunction::StddevSample, arg)
}

/// Distinct elements in first-seen order.
#[must_use]
pub fn unique(arg: &Value) -> Value {
    apply(AggregateFunction::Unique, arg)
}

#[must_use]
pub fn sorted_unique(arg: &Value) -> Value {
    apply(AggregateFunction::SortedUnique, arg)
}

#[must_use]
pub fn count_distinct(arg: &Value) -> Value {
    apply(AggregateFunction::CountDistinct, arg)
}

#[must_use]
pub fn bit_and(arg: &Value) -> Value {
    apply(AggregateFunction::BitAnd, arg)
}

#[must_use]
pub fn bit_or(arg: &Value) -> Value {
    apply(AggregateFunction::BitOr, arg)
}

#[must_use]
pub fn bit_xor(arg: &Value) -> Value {
    apply(AggregateFunction::BitXor, arg)
}

///
/// TESTS
///
