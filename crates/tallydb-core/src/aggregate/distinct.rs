//! Module: aggregate::distinct
//! Responsibility: first-seen de-duplication of values under canonical equality.
//! Does not own: ordering policy for sorted output.
//! Boundary: backing store for UNIQUE and COUNT_DISTINCT accumulators.

use crate::value::{
    StableHash, Value, canonical_cmp,
    hash::{encode_value, stable_hash_bytes},
};
use std::{cmp::Ordering, collections::HashMap};

///
/// DistinctValues
///
/// Insertion-ordered set of values. Buckets are keyed by the stable hash of
/// each value's normalized encoding; membership inside a bucket is decided
/// by canonical equality, so hash collisions never merge distinct values.
///

#[derive(Clone, Debug, Default)]
pub struct DistinctValues {
    values: Vec<Value>,
    buckets: HashMap<StableHash, Vec<usize>>,
}

impl DistinctValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one value. Returns `true` when the value was not yet present.
    pub fn insert(&mut self, value: &Value) -> bool {
        // Values too large to encode still de-duplicate correctly through
        // the shared fallback bucket.
        let hash = encode_value(value).map_or(0, |bytes| stable_hash_bytes(&bytes));
        let bucket = self.buckets.entry(hash).or_default();
        if bucket
            .iter()
            .any(|index| canonical_cmp(&self.values[*index], value) == Ordering::Equal)
        {
            return false;
        }

        bucket.push(self.values.len());
        self.values.push(value.clone());

        true
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Distinct values in first-seen order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

///
/// TESTS
///
