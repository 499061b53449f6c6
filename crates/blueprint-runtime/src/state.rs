//! Per-node runtime state.
//!
//! The plan graph itself is immutable during execution (it is borrowed
//! read-only from [`blueprint_kernel::Plan`]); all mutable per-node state
//! the scheduler needs lives here, in a parallel array keyed by
//! [`NodeId`], so the graph is never shared-mutable during a run.

use blueprint_kernel::error::NodeError;
use blueprint_kernel::{NodeId, Value};
use std::fmt;

/// A node's result once it reaches a terminal state: the value it
/// produced, or the structured failure it carries.
pub type NodeOutcome = Result<Value, NodeError>;

/// A node's lifecycle: `Pending → Ready → Running → {Succeeded | Failed
/// | Cancelled}`. Terminal states are monotonic — once set, a node's
/// state never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// Created, waiting on unmet `data_dep`/`order_dep` edges.
    Pending,
    /// Every dependency has succeeded; waiting for a scheduler slot.
    Ready,
    /// Dispatched to its kind driver and not yet terminal.
    Running,
    /// Produced a result value.
    Succeeded,
    /// The driver failed, or a dependency failed (`DependencyError`).
    Failed,
    /// Did not run to completion because the plan was cancelled.
    Cancelled,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Derives the reporting [`NodeState`] from a terminal [`NodeOutcome`].
pub fn state_of(outcome: &NodeOutcome) -> NodeState {
    match outcome {
        Ok(_) => NodeState::Succeeded,
        Err(NodeError::Cancelled) => NodeState::Cancelled,
        Err(_) => NodeState::Failed,
    }
}

/// Labels a completed node for the [`crate::report::ExecutionReport`].
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub id: NodeId,
    pub state: NodeState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeded_outcome_maps_to_succeeded_state() {
        let outcome: NodeOutcome = Ok(Value::Null);
        assert_eq!(state_of(&outcome), NodeState::Succeeded);
    }

    #[test]
    fn cancelled_error_maps_to_cancelled_state() {
        let outcome: NodeOutcome = Err(NodeError::Cancelled);
        assert_eq!(state_of(&outcome), NodeState::Cancelled);
    }

    #[test]
    fn operation_error_maps_to_failed_state() {
        let outcome: NodeOutcome = Err(NodeError::Operation("boom".into()));
        assert_eq!(state_of(&outcome), NodeState::Failed);
    }

    #[test]
    fn only_terminal_states_report_terminal() {
        assert!(!NodeState::Pending.is_terminal());
        assert!(!NodeState::Ready.is_terminal());
        assert!(!NodeState::Running.is_terminal());
        assert!(NodeState::Succeeded.is_terminal());
        assert!(NodeState::Failed.is_terminal());
        assert!(NodeState::Cancelled.is_terminal());
    }
}
