use crate::plan::PlanError;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Every failure leaving the COLLECT stage is expressed as one of these.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    /// Construct an InternalError from its classification parts.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct an executor-origin invariant violation.
    pub(crate) fn executor_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Executor,
            message.into(),
        )
    }

    /// Construct a merge-origin invariant violation.
    pub(crate) fn merge_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Merge,
            message.into(),
        )
    }

    /// Construct an executor-origin internal error.
    pub(crate) fn executor_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Executor, message.into())
    }

    /// Construct an upstream contract breach (bad or missing input rows).
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Upstream, message.into())
    }

    /// Construct an executor-origin resource exhaustion error.
    pub(crate) fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::ResourceExhausted,
            ErrorOrigin::Executor,
            message.into(),
        )
    }

    /// Construct a cancellation error for a specific origin.
    pub(crate) fn cancelled(origin: ErrorOrigin) -> Self {
        Self::new(ErrorClass::Cancelled, origin, "collect execution cancelled")
    }

    /// Construct a serialize-origin unsupported error.
    pub(crate) fn serialize_unsupported(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::Unsupported,
            ErrorOrigin::Serialize,
            message.into(),
        )
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }

    /// Whether this error was raised by cooperative cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.class, ErrorClass::Cancelled)
    }
}

impl From<PlanError> for InternalError {
    fn from(err: PlanError) -> Self {
        Self::new(ErrorClass::Unsupported, ErrorOrigin::Plan, err.to_string())
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    InvariantViolation,
    Unsupported,
    Internal,
    ResourceExhausted,
    Cancelled,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvariantViolation => "invariant_violation",
            Self::Unsupported => "unsupported",
            Self::Internal => "internal",
            Self::ResourceExhausted => "resource_exhausted",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Internal origin taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Plan,
    Executor,
    Merge,
    Upstream,
    Serialize,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Plan => "plan",
            Self::Executor => "executor",
            Self::Merge => "merge",
            Self::Upstream => "upstream",
            Self::Serialize => "serialize",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_class_prefixes_origin_and_class() {
        let err = InternalError::executor_invariant("sorted input regressed");

        assert_eq!(
            err.display_with_class(),
            "executor:invariant_violation: sorted input regressed"
        );
    }

    #[test]
    fn plan_errors_map_to_unsupported_plan_origin() {
        let err = InternalError::from(PlanError::DuplicateOutputVariable {
            name: "total".to_string(),
        });

        assert_eq!(err.class, ErrorClass::Unsupported);
        assert_eq!(err.origin, ErrorOrigin::Plan);
        assert!(err.message.contains("total"));
    }

    #[test]
    fn cancellation_is_classified() {
        let err = InternalError::cancelled(ErrorOrigin::Merge);

        assert!(err.is_cancelled());
        assert!(!InternalError::upstream("row stream broke").is_cancelled());
    }
}
