//! Module: collect::pipeline
//! Responsibility: run pre-sort, COLLECT and post-sort as one local stage.
//! Does not own: deciding which sorts exist (method selection does).
//! Boundary: single-node execution of a selected physical COLLECT.

use crate::{
    collect::{executor::CollectExecutor, sort::SortStage},
    error::InternalError,
    row::Row,
};

///
/// CollectPipeline
///

#[derive(Clone, Debug)]
pub struct CollectPipeline {
    pre_sort: Option<SortStage>,
    executor: CollectExecutor,
    post_sort: Option<SortStage>,
}

impl CollectPipeline {
    #[must_use]
    pub const fn new(
        pre_sort: Option<SortStage>,
        executor: CollectExecutor,
        post_sort: Option<SortStage>,
    ) -> Self {
        Self {
            pre_sort,
            executor,
            post_sort,
        }
    }

    #[must_use]
    pub const fn pre_sort(&self) -> Option<&SortStage> {
        self.pre_sort.as_ref()
    }

    #[must_use]
    pub const fn executor(&self) -> &CollectExecutor {
        &self.executor
    }

    #[must_use]
    pub const fn post_sort(&self) -> Option<&SortStage> {
        self.post_sort.as_ref()
    }

    /// Run every stage to completion.
    pub fn run<I>(&self, input: I) -> Result<Vec<Row>, InternalError>
    where
        I: IntoIterator<Item = Result<Row, InternalError>>,
    {
        let collected = match &self.pre_sort {
            Some(sort) => {
                let sorted = sort.sort(input)?;
                self.executor.collect_rows(sorted.into_iter().map(Ok))?
            }
            None => self.executor.collect_rows(input)?,
        };

        match &self.post_sort {
            Some(sort) => sort.sort(collected.into_iter().map(Ok)),
            None => Ok(collected),
        }
    }
}
