//! Plan description for one COLLECT stage and its validation rules.

mod collect;
mod expr;
mod validate;

pub use collect::{AggregateSpec, CollectMethod, CollectPlan, GroupKeySpec};
pub use expr::Expr;
pub use validate::PlanError;
