//! Module: collect::sort
//! Responsibility: materializing ascending sort by key expressions.
//! Does not own: the decision of where sorts go (method selection does).
//! Boundary: pre-sort before sorted COLLECT, post-sort after hash COLLECT.

use crate::{
    collect::key::{GroupKey, GroupKeyExtractor},
    error::InternalError,
    plan::{Expr, GroupKeySpec},
    row::Row,
};

///
/// SortStage
///
/// Stable ascending sort of whole rows by a tuple of expressions under the
/// canonical value order. Materializes its input.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SortStage {
    keys: Vec<Expr>,
}

impl SortStage {
    #[must_use]
    pub const fn by_exprs(keys: Vec<Expr>) -> Self {
        Self { keys }
    }

    /// Sort by output variables of an upstream stage.
    #[must_use]
    pub fn by_variables<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::by_exprs(names.into_iter().map(Expr::var).collect())
    }

    #[must_use]
    pub fn keys(&self) -> &[Expr] {
        &self.keys
    }

    /// Drain `input` and return its rows in key order.
    pub fn sort<I>(&self, input: I) -> Result<Vec<Row>, InternalError>
    where
        I: IntoIterator<Item = Result<Row, InternalError>>,
    {
        let extractor = GroupKeyExtractor::new(
            &self
                .keys
                .iter()
                .map(|expr| GroupKeySpec {
                    output: String::new(),
                    expr: expr.clone(),
                })
                .collect::<Vec<_>>(),
        );

        let mut keyed = input
            .into_iter()
            .map(|row| {
                let row = row?;
                Ok((extractor.extract(&row)?, row))
            })
            .collect::<Result<Vec<(GroupKey, Row)>, InternalError>>()?;
        keyed.sort_by(|(left, _), (right, _)| left.cmp(right));

        Ok(keyed.into_iter().map(|(_, row)| row).collect())
    }
}

///
/// TESTS
///
