use crate::value::Value;
use derive_more::{Deref, DerefMut, IntoIterator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// Row
///
/// Ordered mapping from variable name to value. Input rows carry the
/// variables produced by upstream stages; output rows carry the group-key
/// and aggregate output variables of one COLLECT.
///

#[derive(
    Clone, Debug, Default, Deref, DerefMut, Deserialize, Eq, IntoIterator, PartialEq, Serialize,
)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Value>);

impl Row {
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Builder-style insert, used heavily by fixtures and plan tests.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Read one variable, or null when the row does not bind it.
    #[must_use]
    pub fn value_or_null(&self, name: &str) -> &Value {
        static NULL: Value = Value::Null;

        self.0.get(name).unwrap_or(&NULL)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_serialize_as_plain_objects() {
        let row = Row::new().with("b", 2).with("a", "x");
        let json = serde_json::to_string(&row).expect("serialize");

        assert_eq!(json, r#"{"a":"x","b":2.0}"#);
    }

    #[test]
    fn missing_variables_read_as_null() {
        let row = Row::new().with("a", true);

        assert_eq!(row.value_or_null("a"), &Value::Bool(true));
        assert!(row.value_or_null("b").is_null());
        assert_eq!(row.len(), 1);
    }
}
