use super::*;
use serde_json::json;

fn v(json: serde_json::Value) -> Value {
    serde_json::from_value(json).expect("json literal must deserialize into a value")
}

#[test]
fn cross_type_order_is_fixed() {
    let ordered = [
        Value::Null,
        Value::Bool(false),
        Value::Bool(true),
        Value::from(-1e9),
        Value::from(42),
        Value::from(""),
        Value::from("a"),
        Value::List(vec![]),
        Value::list([1]),
        Value::Map(BTreeMap::new()),
    ];

    for pair in ordered.windows(2) {
        assert_eq!(
            canonical_cmp(&pair[0], &pair[1]),
            Ordering::Less,
            "{:?} must sort before {:?}",
            pair[0],
            pair[1],
        );
    }
}

#[test]
fn arrays_compare_up_to_the_longer_length() {
    assert!(v(json!([1, 2])) < v(json!([1, 3])));
    assert!(v(json!([1, 2])) < v(json!([1, 2, 0])));
    assert!(v(json!([2])) > v(json!([1, 99, 99])));
    assert_eq!(v(json!([null])), v(json!([])));
    assert_eq!(v(json!([1, null, null])), v(json!([1])));
    assert!(v(json!([])) < v(json!([false])));
}

#[test]
fn objects_compare_over_the_union_of_keys() {
    // At key `a` the right side reads as null.
    assert!(v(json!({ "a": 1 })) > v(json!({ "b": 1 })));
    assert!(v(json!({ "a": 1 })) < v(json!({ "a": 2 })));
    assert!(v(json!({ "a": 1 })) < v(json!({ "a": 1, "b": 0 })));
    assert!(v(json!({})) < v(json!({ "zzz": 15 })));
    assert_eq!(v(json!({ "a": 1, "b": null })), v(json!({ "a": 1 })));
    assert_eq!(v(json!({ "a": null })), v(json!({})));
}

#[test]
fn signed_zero_and_nan_are_total() {
    assert_eq!(Value::from(0.0), Value::from(-0.0));
    assert_eq!(Value::from(f64::NAN), Value::from(f64::NAN));
    assert!(Value::from(f64::NAN) > Value::from(f64::INFINITY));
    assert!(Value::from(f64::NAN) < Value::from(""));
}

#[test]
fn mixed_set_extremes_follow_canonical_order() {
    let mixed = v(json!([
        1, 42, -13, 19, 23, 0, "foo", "bar", true, false,
        [], [1, 2], {}, { "zzz": 15 }, { "zzz": 2 }
    ]));
    let items = mixed.as_list().expect("array literal");

    assert_eq!(items.iter().min(), Some(&Value::Bool(false)));
    assert_eq!(items.iter().max(), Some(&v(json!({ "zzz": 15 }))));
}

#[test]
fn json_round_trip_preserves_shape() {
    let value = v(json!({ "group": "g1", "values": [1, 2.5, null, true] }));
    let encoded = serde_json::to_string(&value).expect("serialize");
    let decoded: Value = serde_json::from_str(&encoded).expect("deserialize");

    assert_eq!(decoded, value);
    assert_eq!(
        value.attribute("values").and_then(Value::as_list).map(Vec::len),
        Some(4)
    );
    assert_eq!(value.attribute("missing"), None);
    assert_eq!(Value::from(3).attribute("group"), None);
}

#[test]
fn rank_matches_tag_order() {
    assert_eq!(Value::Null.canonical_rank(), 0);
    assert_eq!(Value::from("x").canonical_rank(), 3);
    assert_eq!(Value::Map(BTreeMap::new()).canonical_tag().label(), "object");
    assert_eq!(ValueTag::Number.to_u8(), 3);
}
