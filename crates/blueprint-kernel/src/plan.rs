//! The plan graph and its builder.

use crate::error::ScriptError;
use crate::node::{Node, NodeId, NodeKind, Span};
use crate::value::Value;
use std::collections::BTreeSet;
use tracing::{debug, trace};

/// An append-only DAG of operation nodes, frozen at the end of planning.
///
/// `Plan` owns every node; the executor borrows it read-only and keeps
/// mutable per-node runtime state in a parallel structure keyed by
/// `NodeId`, so the graph itself is never shared-mutable during
/// execution.
#[derive(Debug, Clone)]
pub struct Plan {
    nodes: Vec<Node>,
    roots: BTreeSet<NodeId>,
}

impl Plan {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn roots(&self) -> &BTreeSet<NodeId> {
        &self.roots
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.as_u32() as usize)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Builds a [`Plan`] incrementally as the script driver calls intrinsics.
///
/// Construction order is topological by assignment: `new_node` can only
/// take `data_deps`/`order_deps` referencing nodes already present in
/// `self.nodes`, which is what makes the graph acyclic without a runtime
/// cycle check (invariant 1 of the data model).
#[derive(Debug, Default)]
pub struct PlanBuilder {
    nodes: Vec<Node>,
    roots: BTreeSet<NodeId>,
    frozen: bool,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node of `kind` with the given `args`, returning a
    /// `Deferred`-producing [`NodeId`]. Any `Deferred` nested anywhere
    /// inside `args` is collected into `data_deps` automatically — the
    /// caller never declares data dependencies by hand.
    ///
    /// Cost is linear in the size of `args`, matching the contract in
    /// the component design.
    pub fn new_node(
        &mut self,
        kind: NodeKind,
        args: Value,
        span: Option<Span>,
    ) -> Result<NodeId, ScriptError> {
        if self.frozen {
            return Err(ScriptError::PlanFrozen);
        }

        let mut data_deps = Vec::new();
        args.collect_deferred(&mut data_deps);
        data_deps.sort_unstable();
        data_deps.dedup();

        for dep in &data_deps {
            if dep.as_u32() as usize >= self.nodes.len() {
                return Err(ScriptError::UnknownNode(*dep));
            }
        }

        let id = NodeId::new(self.nodes.len() as u32);
        trace!(node = %id, kind = kind.name(), deps = data_deps.len(), "allocating node");

        self.nodes.push(Node {
            id,
            kind,
            args,
            data_deps,
            order_deps: Vec::new(),
            span,
        });

        Ok(id)
    }

    /// Adds an order-only dependency: `node` must not start until
    /// `predecessor` has succeeded, though `predecessor`'s value is not
    /// consumed. Used exclusively by `after` and `sequence`.
    pub fn add_order_edge(
        &mut self,
        node: NodeId,
        predecessor: NodeId,
    ) -> Result<(), ScriptError> {
        if self.frozen {
            return Err(ScriptError::PlanFrozen);
        }
        if predecessor.as_u32() >= node.as_u32() {
            return Err(ScriptError::UnknownNode(predecessor));
        }
        let idx = node.as_u32() as usize;
        let n = self
            .nodes
            .get_mut(idx)
            .ok_or(ScriptError::UnknownNode(node))?;
        if !n.order_deps.contains(&predecessor) {
            n.order_deps.push(predecessor);
        }
        Ok(())
    }

    /// Marks `node` as a root: its completion is awaited by the executor
    /// even if no later node consumes its value. Called once per
    /// top-level expression the driver cares about, and implicitly for
    /// every node with observable side effects (I/O, network, exec,
    /// timers, console output) whose result is otherwise discarded.
    pub fn mark_root(&mut self, node: NodeId) -> Result<(), ScriptError> {
        if self.frozen {
            return Err(ScriptError::PlanFrozen);
        }
        if node.as_u32() as usize >= self.nodes.len() {
            return Err(ScriptError::UnknownNode(node));
        }
        self.roots.insert(node);
        Ok(())
    }

    /// Freezes the plan, disallowing further mutation, and returns it.
    pub fn freeze(mut self) -> Plan {
        self.frozen = true;
        debug!(nodes = self.nodes.len(), roots = self.roots.len(), "plan frozen");
        Plan {
            nodes: std::mem::take(&mut self.nodes),
            roots: std::mem::take(&mut self.roots),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Deferred;

    fn lit(v: impl Into<Value>) -> Value {
        v.into()
    }

    #[test]
    fn new_node_collects_nested_deferred_as_data_dep() {
        let mut b = PlanBuilder::new();
        let a = b.new_node(NodeKind::Now, Value::Null, None).unwrap();
        let args = Value::List(vec![Deferred(a).into(), lit(1i64)]);
        let n = b.new_node(NodeKind::Gather, args, None).unwrap();

        let plan = b.freeze();
        assert_eq!(plan.node(n).unwrap().data_deps, vec![a]);
    }

    #[test]
    fn unknown_node_reference_is_rejected() {
        let mut b = PlanBuilder::new();
        let phantom = NodeId::new(99);
        let args = Value::Deferred(phantom);
        let err = b.new_node(NodeKind::Stdout, args, None).unwrap_err();
        assert!(matches!(err, ScriptError::UnknownNode(id) if id == phantom));
    }

    #[test]
    fn order_edge_requires_earlier_node() {
        let mut b = PlanBuilder::new();
        let a = b.new_node(NodeKind::Now, Value::Null, None).unwrap();
        let c = b.new_node(NodeKind::Now, Value::Null, None).unwrap();
        b.add_order_edge(c, a).unwrap();
        let plan = b.freeze();
        assert_eq!(plan.node(c).unwrap().order_deps, vec![a]);
    }

    #[test]
    fn freeze_rejects_further_mutation() {
        let mut b = PlanBuilder::new();
        let a = b.new_node(NodeKind::Now, Value::Null, None).unwrap();
        b.mark_root(a).unwrap();
        let mut b2 = PlanBuilder::new();
        let x = b2.new_node(NodeKind::Now, Value::Null, None).unwrap();
        let _plan = b2.freeze();
        // A builder consumed by freeze() can no longer be used — enforced
        // by ownership, not a runtime flag, but `frozen` still guards
        // partially-shared builder wrappers at the runtime layer.
        let _ = x;
    }

    #[test]
    fn mark_root_rejects_unknown_node() {
        let mut b = PlanBuilder::new();
        let err = b.mark_root(NodeId::new(0)).unwrap_err();
        assert!(matches!(err, ScriptError::UnknownNode(_)));
    }
}
