//! Crate-level error types for `blueprint-kernel`.
//!
//! Two distinct error families live here, matching the planning/execution
//! split the rest of the crate is organized around:
//!
//! - [`ScriptError`] — a planning-time violation (branching on a
//!   [`Deferred`](crate::value::Deferred), wrong arity on an intrinsic, a
//!   non-serializable value reaching a plan file). Raised by
//!   [`crate::plan::PlanBuilder`] and [`crate::intrinsics`].
//! - [`NodeError`] — the structured failure a node carries in its terminal
//!   `Failed` state once the executor has run it. `blueprint-runtime` is the
//!   only producer of `NodeError::Operation`; the other variants
//!   (`Dependency`, `Cancelled`) are propagated mechanically by the
//!   scheduler and are represented here so the value returned by a failed
//!   node is inspectable without depending on `blueprint-runtime`.
//!
//! Both compose into the crate-level [`KernelError`] via `#[from]`,
//! unifying each sub-module's error type behind one `#[non_exhaustive]`
//! enum, with [`error_stack::Report`] available for context-carrying
//! propagation.

use crate::node::NodeId;
use thiserror::Error;

/// A planning-time violation: the script asked the plan builder to do
/// something the value/graph model forbids.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ScriptError {
    /// The script branched on, compared, or otherwise observed a raw
    /// `Deferred` instead of threading it through an intrinsic.
    #[error("cannot branch on or observe deferred value from node {0}")]
    DeferredObserved(NodeId),

    /// An intrinsic was called with the wrong number of arguments.
    #[error("intrinsic `{intrinsic}` expected {expected} argument(s), got {got}")]
    WrongArity {
        intrinsic: &'static str,
        expected: usize,
        got: usize,
    },

    /// An intrinsic argument was of the wrong kind and could not be
    /// resolved even allowing for `Deferred` lifting.
    #[error("intrinsic `{intrinsic}` argument `{argument}` has the wrong type: {detail}")]
    InvalidArgument {
        intrinsic: &'static str,
        argument: &'static str,
        detail: String,
    },

    /// A combinator (`gather`, `any`, `at_least`, `at_most`) was given an
    /// operand list that violates its arity rule (e.g. `at_least` with
    /// `n` greater than the operand count).
    #[error("combinator `{combinator}` misconfigured: {detail}")]
    InvalidCombinator {
        combinator: &'static str,
        detail: String,
    },

    /// A value reaching plan serialization could not be encoded (contains
    /// a handle, or a cycle was detected despite construction-order
    /// acyclicity — defensive, should be unreachable).
    #[error("value is not serializable into a plan file: {0}")]
    NonSerializableValue(String),

    /// The builder was asked to mutate a plan that has already been
    /// frozen via `freeze()`.
    #[error("plan already frozen, no further nodes may be added")]
    PlanFrozen,

    /// `add_order_edge` or a node reference pointed at a `NodeId` that
    /// does not exist yet in this planning session.
    #[error("node {0} referenced before it was constructed")]
    UnknownNode(NodeId),
}

/// The structured failure a node carries once it reaches `Failed`.
///
/// `Operation`, `Dependency`, and `Cancelled` are the terminal failure
/// kinds; a timeout is deliberately absent here because it resolves to
/// `Value::Null`, not a failure.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum NodeError {
    /// The kind driver itself failed (I/O error, transport failure,
    /// non-UTF8 decode, subprocess spawn failure, ...).
    #[error("operation failed: {0}")]
    Operation(String),

    /// A `data_dep` or `order_dep` of this node failed or was cancelled,
    /// so this node could never become ready.
    #[error("dependency {0} failed")]
    Dependency(NodeId),

    /// The node did not run to completion because the plan was
    /// cancelled before or during its execution.
    #[error("cancelled")]
    Cancelled,
}

/// Crate-level error type for `blueprint-kernel`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KernelError {
    /// A planning-time violation.
    #[error("script error: {0}")]
    Script(#[from] ScriptError),

    /// A configuration-related error (requires the `config` feature).
    #[cfg(feature = "config")]
    #[error("config error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// A JSON (de)serialization error, surfacing from `json_encode`
    /// argument validation or plan-file value encoding.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias using [`error_stack::Report`].
pub type KernelResult<T> = Result<T, error_stack::Report<KernelError>>;

#[cfg(test)]
mod tests {
    use super::*;
    use error_stack::{Report, ResultExt};

    #[test]
    fn script_error_converts_via_from() {
        let err: KernelError = ScriptError::PlanFrozen.into();
        assert!(matches!(err, KernelError::Script(_)));
        assert!(err.to_string().contains("already frozen"));
    }

    #[test]
    fn deferred_observed_carries_node_id() {
        let err = ScriptError::DeferredObserved(NodeId::new(7));
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn node_error_dependency_formats_with_id() {
        let err = NodeError::Dependency(NodeId::new(3));
        assert_eq!(err.to_string(), "dependency 3 failed");
    }

    #[test]
    fn report_carries_context() {
        let result: KernelResult<()> = Err(Report::new(KernelError::Script(
            ScriptError::PlanFrozen,
        )))
        .attach("while adding a node after the script returned");

        let report = result.unwrap_err();
        let display = format!("{report:?}");
        assert!(display.contains("already frozen"));
        assert!(display.contains("while adding a node"));
    }
}
