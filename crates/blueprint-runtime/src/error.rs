//! Crate-level error types for `blueprint-runtime`.
//!
//! [`blueprint_kernel::error::NodeError`] is the structured failure a node
//! carries in its terminal `Failed` state — it is produced here by every
//! kind driver and propagated mechanically by the scheduler. [`RuntimeError`]
//! is the executor-level error family: things that go wrong driving the
//! scheduler itself (a panicked task, a malformed config), not a single
//! node's operation.

use blueprint_kernel::NodeId;
use thiserror::Error;

/// Executor-level error, distinct from a single node's [`NodeError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// A per-kind driver task panicked or was aborted before it could
    /// report a result.
    #[error("node {node} task join failed: {detail}")]
    TaskJoin { node: NodeId, detail: String },

    /// The plan references a `NodeId` the executor has no runtime slot
    /// for — defensive, should be unreachable for a plan produced by
    /// `PlanBuilder::freeze`.
    #[error("node {0} has no runtime slot")]
    MissingNode(NodeId),

    /// Failed to load an [`crate::config::ExecutorConfig`] (requires the
    /// `config` feature).
    #[cfg(feature = "config")]
    #[error("executor config error: {0}")]
    Config(#[from] config::ConfigError),
}

/// Convenience result alias, matching `blueprint-kernel::KernelResult`'s
/// use of [`error_stack::Report`] for context-carrying propagation.
pub type RuntimeResult<T> = Result<T, error_stack::Report<RuntimeError>>;
