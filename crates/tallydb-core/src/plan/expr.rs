//! Module: plan::expr
//! Responsibility: the minimal expression model COLLECT reads rows with.
//! Does not own: general expression evaluation (upstream stages do that).
//! Boundary: group keys and aggregate inputs are `Expr`s over one row.

use crate::{error::InternalError, row::Row, value::Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

///
/// Expr
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Expr {
    Constant(Value),
    Variable(String),
    Attribute { variable: String, path: Vec<String> },
    List(Vec<Self>),
    Object(Vec<(String, Self)>),
}

impl Expr {
    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Constant(value.into())
    }

    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// `variable.a.b.c` style attribute access.
    #[must_use]
    pub fn attr<I, S>(variable: impl Into<String>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Attribute {
            variable: variable.into(),
            path: path.into_iter().map(Into::into).collect(),
        }
    }

    /// Collect every variable name this expression reads.
    pub fn referenced_variables<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Constant(_) => {}
            Self::Variable(name) | Self::Attribute { variable: name, .. } => {
                out.insert(name.as_str());
            }
            Self::List(items) => {
                for item in items {
                    item.referenced_variables(out);
                }
            }
            Self::Object(entries) => {
                for (_, item) in entries {
                    item.referenced_variables(out);
                }
            }
        }
    }

    /// Evaluate against one input row.
    ///
    /// A variable the row does not bind is an upstream contract breach.
    /// Attribute access into missing or non-object values yields null.
    pub fn evaluate(&self, row: &Row) -> Result<Value, InternalError> {
        match self {
            Self::Constant(value) => Ok(value.clone()),
            Self::Variable(name) => row.get(name).cloned().ok_or_else(|| unbound(name)),
            Self::Attribute { variable, path } => {
                let mut current = row.get(variable).ok_or_else(|| unbound(variable))?;
                for step in path {
                    match current.attribute(step) {
                        Some(next) => current = next,
                        None => return Ok(Value::Null),
                    }
                }
                Ok(current.clone())
            }
            Self::List(items) => items
                .iter()
                .map(|item| item.evaluate(row))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Self::Object(entries) => entries
                .iter()
                .map(|(name, item)| Ok((name.clone(), item.evaluate(row)?)))
                .collect::<Result<_, InternalError>>()
                .map(Value::Map),
        }
    }
}

fn unbound(name: &str) -> InternalError {
    InternalError::upstream(format!("input row does not bind variable '{name}'"))
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorOrigin;

    fn doc_row() -> Row {
        Row::new().with(
            "i",
            Value::object([
                ("group", Value::from("g1")),
                ("nested", Value::object([("value", 7)])),
            ]),
        )
    }

    #[test]
    fn attribute_paths_walk_nested_objects() {
        let row = doc_row();

        assert_eq!(
            Expr::attr("i", ["nested", "value"]).evaluate(&row).expect("eval"),
            Value::from(7)
        );
        assert_eq!(
            Expr::attr("i", ["group"]).evaluate(&row).expect("eval"),
            Value::from("g1")
        );
    }

    #[test]
    fn missing_attributes_evaluate_to_null() {
        let row = doc_row();

        assert!(Expr::attr("i", ["absent"]).evaluate(&row).expect("eval").is_null());
        assert!(
            Expr::attr("i", ["group", "deeper"])
                .evaluate(&row)
                .expect("eval")
                .is_null()
        );
    }

    #[test]
    fn unbound_variables_are_upstream_errors() {
        let err = Expr::var("j")
            .evaluate(&doc_row())
            .expect_err("unbound variable must fail");

        assert_eq!(err.origin, ErrorOrigin::Upstream);
        assert!(err.message.contains("'j'"));
    }

    #[test]
    fn constructors_evaluate_and_report_variables() {
        let expr = Expr::Object(vec![
            ("g".to_string(), Expr::attr("i", ["group"])),
            ("k".to_string(), Expr::List(vec![Expr::constant(1), Expr::var("j")])),
        ]);
        let mut vars = BTreeSet::new();
        expr.referenced_variables(&mut vars);

        assert_eq!(vars.into_iter().collect::<Vec<_>>(), vec!["i", "j"]);

        let row = doc_row().with("j", true);
        assert_eq!(
            expr.evaluate(&row).expect("eval"),
            Value::object([
                ("g", Value::from("g1")),
                ("k", Value::List(vec![Value::from(1), Value::Bool(true)])),
            ])
        );
    }
}
