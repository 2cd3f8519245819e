//! Module: value::hash
//! Responsibility: normalized byte encoding and stable hashing of values.
//! Does not own: grouping equality policy or bucket management.
//! Boundary: consumed by group-key materialization and distinct-value sets.

use crate::{error::InternalError, value::Value};
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Encoding format version byte leading every encoded key.
pub(crate) const VALUE_ENCODING_VERSION: u8 = 2;

/// Stable XXH3 seed used by canonical value hashing.
pub(crate) const VALUE_HASH_SEED: u64 = 0;

///
/// StableHash
///
/// StableHash is the canonical fixed-width hash identifier used by grouping
/// and distinct-value buckets.
///

pub type StableHash = u64;

fn feed_u8(out: &mut Vec<u8>, x: u8) {
    out.push(x);
}
fn feed_u32(out: &mut Vec<u8>, x: u32) {
    out.extend_from_slice(&x.to_be_bytes());
}
fn feed_u64(out: &mut Vec<u8>, x: u64) {
    out.extend_from_slice(&x.to_be_bytes());
}
fn feed_len(out: &mut Vec<u8>, len: usize) -> Result<(), InternalError> {
    let len = u32::try_from(len).map_err(|_| {
        InternalError::serialize_unsupported(format!(
            "value of length {len} exceeds the key encoding limit"
        ))
    })?;
    feed_u32(out, len);

    Ok(())
}

// Bit pattern with `-0.0` folded into `0.0` and every NaN folded into one.
fn normalized_number_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0
    } else {
        n.to_bits()
    }
}

#[cfg(test)]
thread_local! {
    static TEST_HASH_OVERRIDE: std::cell::Cell<Option<StableHash>> =
        const { std::cell::Cell::new(None) };
}

#[cfg(test)]
#[expect(clippy::redundant_closure_for_method_calls)]
fn test_hash_override() -> Option<StableHash> {
    TEST_HASH_OVERRIDE.with(|cell| cell.get())
}

// Execute one closure with a thread-local test hash override and always restore
// the previous override state, even if the closure panics.
#[cfg(test)]
pub(crate) fn with_test_hash_override<T>(
    override_hash: StableHash,
    f: impl FnOnce() -> T + std::panic::UnwindSafe,
) -> T {
    let previous = TEST_HASH_OVERRIDE.with(|cell| cell.replace(Some(override_hash)));
    let result = std::panic::catch_unwind(f);
    TEST_HASH_OVERRIDE.with(|cell| cell.set(previous));
    match result {
        Ok(value) => value,
        Err(payload) => std::panic::resume_unwind(payload),
    }
}

/// Append the normalized encoding of one value.
///
/// Two values encode to the same bytes iff they compare equal under
/// `canonical_cmp`.
pub fn encode_value_into(value: &Value, out: &mut Vec<u8>) -> Result<(), InternalError> {
    feed_u8(out, value.canonical_tag().to_u8());

    match value {
        Value::Null => {}
        Value::Bool(b) => feed_u8(out, u8::from(*b)),
        Value::Number(n) => feed_u64(out, normalized_number_bits(*n)),
        Value::Text(s) => {
            feed_len(out, s.len())?;
            out.extend_from_slice(s.as_bytes());
        }
        Value::List(items) => {
            // Trailing nulls compare equal to absent elements.
            let len = items
                .iter()
                .rposition(|item| !item.is_null())
                .map_or(0, |last| last + 1);
            feed_len(out, len)?;
            for item in &items[..len] {
                encode_value_into(item, out)?;
            }
        }
        Value::Map(entries) => {
            // Null attributes compare equal to absent ones. BTreeMap iteration
            // is already in canonical key order.
            let present = entries.iter().filter(|(_, item)| !item.is_null());
            feed_len(out, present.clone().count())?;
            for (key, item) in present {
                feed_u8(out, 0xFD);
                feed_len(out, key.len())?;
                out.extend_from_slice(key.as_bytes());
                feed_u8(out, 0xFE);
                encode_value_into(item, out)?;
            }
        }
    }

    Ok(())
}

/// Encode one value as a standalone versioned byte string.
pub fn encode_value(value: &Value) -> Result<Vec<u8>, InternalError> {
    let mut out = vec![VALUE_ENCODING_VERSION];
    encode_value_into(value, &mut out)?;

    Ok(out)
}

/// Encode a tuple of values (one group key) as a versioned byte string.
pub fn encode_tuple(values: &[Value]) -> Result<Vec<u8>, InternalError> {
    let mut out = vec![VALUE_ENCODING_VERSION];
    feed_len(&mut out, values.len())?;
    for value in values {
        encode_value_into(value, &mut out)?;
    }

    Ok(out)
}

/// Hash one encoded byte string with the stable grouping hashing contract.
#[must_use]
pub fn stable_hash_bytes(bytes: &[u8]) -> StableHash {
    #[cfg(test)]
    if let Some(override_hash) = test_hash_override() {
        return override_hash;
    }

    xxh3_64_with_seed(bytes, VALUE_HASH_SEED)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn signed_zero_encodes_identically() {
        assert_eq!(
            encode_value(&Value::Number(0.0)).expect("encode"),
            encode_value(&Value::Number(-0.0)).expect("encode"),
            "key encoding must fold negative zero into zero",
        );
    }

    #[test]
    fn nan_payloads_encode_identically() {
        let quiet = f64::NAN;
        let other = f64::from_bits(f64::NAN.to_bits() | 1);

        assert_eq!(
            encode_value(&Value::Number(quiet)).expect("encode"),
            encode_value(&Value::Number(other)).expect("encode"),
        );
    }

    #[test]
    fn tuple_encoding_is_not_ambiguous_across_boundaries() {
        let left = encode_tuple(&[Value::from("ab"), Value::from("c")]).expect("encode");
        let right = encode_tuple(&[Value::from("a"), Value::from("bc")]).expect("encode");

        assert_ne!(left, right, "length prefixes must separate tuple members");
    }

    #[test]
    fn stable_hash_is_deterministic_for_same_value() {
        let value = Value::List(vec![Value::from(1.5), Value::from("x"), Value::Null]);
        let left = stable_hash_bytes(&encode_value(&value).expect("encode"));
        let right = stable_hash_bytes(&encode_value(&value.clone()).expect("encode"));

        assert_eq!(left, right);
    }

    #[test]
    fn stable_hash_ignores_map_construction_order() {
        let mut left = BTreeMap::new();
        left.insert("z".to_string(), Value::from(9));
        left.insert("a".to_string(), Value::from(1));
        let mut right = BTreeMap::new();
        right.insert("a".to_string(), Value::from(1));
        right.insert("z".to_string(), Value::from(9));

        assert_eq!(
            stable_hash_bytes(&encode_value(&Value::Map(left)).expect("encode")),
            stable_hash_bytes(&encode_value(&Value::Map(right)).expect("encode")),
            "stable hash must not depend on map insertion order",
        );
    }

    #[test]
    fn absent_and_null_members_encode_identically() {
        let encode = |json| encode_value(&serde_json::from_value(json).expect("value")).expect("encode");

        assert_eq!(
            encode(serde_json::json!([1, [2, null], null, null])),
            encode(serde_json::json!([1, [2]]))
        );
        assert_eq!(
            encode(serde_json::json!({ "a": 1, "b": null, "c": { "d": null } })),
            encode(serde_json::json!({ "a": 1, "c": {} }))
        );
        assert_ne!(
            encode(serde_json::json!([null, 1])),
            encode(serde_json::json!([1])),
            "only trailing nulls may be dropped",
        );
        assert_ne!(
            encode(serde_json::json!({ "a": [] })),
            encode(serde_json::json!({})),
        );
    }

    #[test]
    fn stable_hash_contract_vector_is_frozen() {
        let bytes = encode_tuple(&[Value::from("group"), Value::from(3)]).expect("encode");

        assert_eq!(
            stable_hash_bytes(&bytes),
            xxh3_64_with_seed(&bytes, 0),
            "stable hash must stay XXH3-64 with seed zero over the versioned encoding",
        );
        assert_eq!(bytes[0], VALUE_ENCODING_VERSION);
    }

    #[test]
    fn hash_override_is_restored_after_scope() {
        let bytes = encode_value(&Value::from(true)).expect("encode");
        let forced = with_test_hash_override(7, || stable_hash_bytes(&bytes));

        assert_eq!(forced, 7);
        assert_ne!(stable_hash_bytes(&bytes), 7);
    }
}
