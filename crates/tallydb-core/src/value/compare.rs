use crate::value::Value;
use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
};

/// Total canonical comparator shared by MIN, MAX, SORTED_UNIQUE and sorting.
///
/// Ordering rules:
/// 1. Canonical variant rank
/// 2. Variant-specific comparison for same-ranked values
///
/// Containers recurse through this same comparator.
#[must_use]
pub fn canonical_cmp(left: &Value, right: &Value) -> Ordering {
    let rank = left.canonical_rank().cmp(&right.canonical_rank());
    if rank != Ordering::Equal {
        return rank;
    }

    canonical_cmp_same_rank(left, right)
}

/// Compare two numbers under the canonical order.
///
/// `-0.0` and `0.0` are equal. NaN equals NaN and sorts above every other
/// number, so the order stays total.
#[must_use]
pub fn canonical_cmp_number(left: f64, right: f64) -> Ordering {
    match (left.is_nan(), right.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
    }
}

fn canonical_cmp_same_rank(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => canonical_cmp_number(*a, *b),
        (Value::Text(a), Value::Text(b)) => a.cmp(b),
        (Value::List(a), Value::List(b)) => canonical_cmp_value_list(a, b),
        (Value::Map(a), Value::Map(b)) => canonical_cmp_value_map(a, b),
        _ => Ordering::Equal,
    }
}

// Lists compare position by position up to the longer length; a missing
// element reads as null.
fn canonical_cmp_value_list(left: &[Value], right: &[Value]) -> Ordering {
    for index in 0..left.len().max(right.len()) {
        let cmp = canonical_cmp(
            left.get(index).unwrap_or(&Value::Null),
            right.get(index).unwrap_or(&Value::Null),
        );
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    Ordering::Equal
}

// Objects compare attribute by attribute over the sorted union of both key
// sets; a missing attribute reads as null.
fn canonical_cmp_value_map(
    left: &BTreeMap<String, Value>,
    right: &BTreeMap<String, Value>,
) -> Ordering {
    let keys = left.keys().chain(right.keys()).collect::<BTreeSet<_>>();
    for key in keys {
        let cmp = canonical_cmp(
            left.get(key).unwrap_or(&Value::Null),
            right.get(key).unwrap_or(&Value::Null),
        );
        if cmp != Ordering::Equal {
            return cmp;
        }
    }

    Ordering::Equal
}
