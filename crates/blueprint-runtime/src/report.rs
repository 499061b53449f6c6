//! Execution summary returned by [`crate::executor::Executor::run`].
//!
//! Pure ambient observability over a finished run, not a script-visible
//! feature: node counts by terminal state plus the dispatch and
//! dependency-failure tallies a caller would otherwise have to
//! reconstruct by walking `node_states` itself.

use crate::state::{NodeOutcome, NodeState};
use blueprint_kernel::NodeId;
use std::collections::HashMap;

/// Final report for one [`crate::executor::Executor::run`] call.
///
/// Carries every node's resolved [`NodeOutcome`] alongside its terminal
/// state — a plan exists to produce values, so a report that only
/// counted states without exposing them would leave the caller unable to
/// read back a root's result.
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// Terminal state reached by every node in the plan.
    pub node_states: HashMap<NodeId, NodeState>,
    /// Terminal result (value or structured error) for every node.
    pub outcomes: HashMap<NodeId, NodeOutcome>,
    /// Total nodes dispatched to a kind driver (excludes combinator
    /// nodes, whose results are computed directly by the scheduler).
    pub dispatch_count: usize,
    /// Nodes whose failure is exactly `DependencyError` — they never ran
    /// their own driver because an upstream node failed first. The
    /// dead-letter-equivalent count for this executor.
    pub dependency_failures: usize,
}

impl ExecutionReport {
    pub fn total_nodes(&self) -> usize {
        self.node_states.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(NodeState::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(NodeState::Failed)
    }

    pub fn cancelled(&self) -> usize {
        self.count(NodeState::Cancelled)
    }

    fn count(&self, state: NodeState) -> usize {
        self.node_states.values().filter(|s| **s == state).count()
    }

    pub fn state_of(&self, id: NodeId) -> Option<NodeState> {
        self.node_states.get(&id).copied()
    }

    pub fn outcome_of(&self, id: NodeId) -> Option<&NodeOutcome> {
        self.outcomes.get(&id)
    }
}
