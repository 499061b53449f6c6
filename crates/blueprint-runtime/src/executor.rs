//! The async plan executor: readiness scheduler, combinator evaluation,
//! and cooperative cancellation over a frozen [`Plan`].
//!
//! Dispatch splits on [`NodeKind::may_suspend`]: suspending kinds go
//! through a `JoinSet`-based dispatch with a semaphore-backed concurrency
//! cap, while compute/coercion kinds run inline on the scheduler task.
//! The "frontier" is every node whose dependencies just became terminal,
//! re-evaluated each time a running node settles, rather than a fixed
//! set of outgoing edges walked once.

use crate::config::ExecutorConfig;
use crate::drivers::{self, DriverContext};
use crate::error::RuntimeError;
use crate::event_source::HandleTable;
use crate::report::ExecutionReport;
use crate::state::{state_of, NodeOutcome, NodeState};
use blueprint_kernel::error::NodeError;
use blueprint_kernel::{Node, NodeId, NodeKind, Plan, Value};
use futures::FutureExt;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// The extracted operand list of a composition node, in construction
/// order — recovered from `args` rather than `data_deps`, since
/// `PlanBuilder::new_node` sorts and dedups `data_deps` and the `gather`
/// result-ordering guarantee depends on the original argument order.
#[derive(Debug, Clone)]
enum Combinator {
    Gather(Vec<NodeId>),
    Any(Vec<NodeId>),
    AtLeast { n: usize, ops: Vec<NodeId> },
    AtMost { n: usize, ops: Vec<NodeId> },
}

impl Combinator {
    fn ops(&self) -> &[NodeId] {
        match self {
            Combinator::Gather(ops) | Combinator::Any(ops) => ops,
            Combinator::AtLeast { ops, .. } | Combinator::AtMost { ops, .. } => ops,
        }
    }
}

fn deferred_ids(items: &[Value]) -> Vec<NodeId> {
    items
        .iter()
        .filter_map(|v| match v {
            Value::Deferred(id) => Some(*id),
            _ => None,
        })
        .collect()
}

fn extract_combinator(node: &Node) -> Option<Combinator> {
    match node.kind {
        NodeKind::Gather => match &node.args {
            Value::List(items) => Some(Combinator::Gather(deferred_ids(items))),
            _ => Some(Combinator::Gather(Vec::new())),
        },
        NodeKind::Any => match &node.args {
            Value::List(items) => Some(Combinator::Any(deferred_ids(items))),
            _ => Some(Combinator::Any(Vec::new())),
        },
        NodeKind::AtLeast | NodeKind::AtMost => {
            let (n, ops) = match &node.args {
                Value::Struct(fields) => {
                    let n = match fields.get("n") {
                        Some(Value::Int(n)) => (*n).max(0) as usize,
                        _ => 0,
                    };
                    let ops = match fields.get("ops") {
                        Some(Value::List(items)) => deferred_ids(items),
                        _ => Vec::new(),
                    };
                    (n, ops)
                }
                _ => (0, Vec::new()),
            };
            Some(if node.kind == NodeKind::AtLeast {
                Combinator::AtLeast { n, ops }
            } else {
                Combinator::AtMost { n, ops }
            })
        }
        _ => None,
    }
}

/// Drives one [`Plan`] to completion. Owns the HTTP client and
/// event-source handle table for the lifetime of every run it performs —
/// separate `run()` calls on the same executor share neither state nor
/// in-flight handles with each other's plan.
pub struct Executor {
    config: ExecutorConfig,
    http_client: reqwest::Client,
    handles: Arc<HandleTable>,
    cancel: CancellationToken,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Executor {
            config,
            http_client: reqwest::Client::new(),
            handles: Arc::new(HandleTable::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// A token the caller can cancel to stop this executor's current or
    /// next `run()` — every `Running` node races its driver against this
    /// token and every `Pending`/`Ready` node is flipped to `Cancelled`
    /// directly, so every node reaches a terminal state in bounded time
    /// after cancellation.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub async fn run(&self, plan: &Plan) -> ExecutionReport {
        let mut run = Run::new(self, plan);
        run.drive().await;
        run.into_report()
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

struct Run<'a> {
    executor: &'a Executor,
    plan: &'a Plan,
    states: HashMap<NodeId, NodeState>,
    outcomes: HashMap<NodeId, NodeOutcome>,
    dependents: HashMap<NodeId, Vec<NodeId>>,
    combinators: HashMap<NodeId, Combinator>,
    remaining: HashMap<NodeId, usize>,
    terminal_queue: VecDeque<NodeId>,
    dispatch_count: usize,
    dependency_failures: usize,
}

impl<'a> Run<'a> {
    fn new(executor: &'a Executor, plan: &'a Plan) -> Self {
        let mut dependents: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut combinators: HashMap<NodeId, Combinator> = HashMap::new();
        let mut remaining: HashMap<NodeId, usize> = HashMap::new();

        for node in plan.nodes() {
            for dep in node.all_deps() {
                dependents.entry(dep).or_default().push(node.id);
            }
            if let Some(combinator) = extract_combinator(node) {
                combinators.insert(node.id, combinator);
            } else {
                remaining.insert(node.id, node.all_deps().count());
            }
        }

        Run {
            executor,
            plan,
            states: HashMap::new(),
            outcomes: HashMap::new(),
            dependents,
            combinators,
            remaining,
            terminal_queue: VecDeque::new(),
            dispatch_count: 0,
            dependency_failures: 0,
        }
    }

    fn is_terminal(&self, id: NodeId) -> bool {
        self.states.get(&id).map(|s| s.is_terminal()).unwrap_or(false)
    }

    /// Records a node's terminal outcome and queues its dependents for
    /// readiness re-evaluation. A no-op if the node already settled —
    /// terminal states are monotonic, so the first settlement wins (this
    /// matters for combinators, which can be finalized before every
    /// listed operand has reported in).
    fn settle(&mut self, id: NodeId, outcome: NodeOutcome) {
        if self.is_terminal(id) {
            return;
        }
        let state = state_of(&outcome);
        trace!(node = %id, %state, "node settled");
        if state == NodeState::Failed {
            if let Err(NodeError::Dependency(_)) = &outcome {
                self.dependency_failures += 1;
            }
        }
        self.states.insert(id, state);
        self.outcomes.insert(id, outcome);
        self.terminal_queue.push_back(id);
    }

    /// Drains `terminal_queue`, advancing every dependent of each newly
    /// terminal node. Dependents that become `Ready` are appended to
    /// `to_dispatch` in discovery order, which — because `dependents` was
    /// built by iterating the plan in ascending `NodeId` order — keeps
    /// same-tick readiness ordered by `NodeId` for deterministic tests.
    fn propagate(&mut self, to_dispatch: &mut VecDeque<NodeId>) {
        while let Some(id) = self.terminal_queue.pop_front() {
            let Some(deps) = self.dependents.get(&id).cloned() else { continue };
            for dependent in deps {
                if self.is_terminal(dependent) {
                    continue;
                }
                if let Some(combinator) = self.combinators.get(&dependent).cloned() {
                    self.advance_combinator(dependent, &combinator, id);
                } else {
                    self.advance_ordinary(dependent, id, to_dispatch);
                }
            }
        }
    }

    fn advance_ordinary(&mut self, node: NodeId, completed_dep: NodeId, to_dispatch: &mut VecDeque<NodeId>) {
        let dep_state = self.states[&completed_dep];
        if dep_state != NodeState::Succeeded {
            self.settle(node, Err(NodeError::Dependency(completed_dep)));
            return;
        }
        let remaining = self.remaining.get_mut(&node).expect("ordinary node tracked in remaining");
        *remaining -= 1;
        if *remaining == 0 {
            self.states.insert(node, NodeState::Ready);
            to_dispatch.push_back(node);
        }
    }

    fn advance_combinator(&mut self, node: NodeId, combinator: &Combinator, completed_dep: NodeId) {
        let dep_state = self.states[&completed_dep];
        let ops = combinator.ops();
        let terminal = ops.iter().filter(|op| self.is_terminal(**op)).count();
        let succeeded = ops.iter().filter(|op| self.states.get(op) == Some(&NodeState::Succeeded)).count();
        let _ = dep_state;

        let done = match combinator {
            Combinator::Gather(_) => terminal == ops.len(),
            Combinator::Any(_) => succeeded >= 1 || terminal == ops.len(),
            Combinator::AtLeast { n, .. } => succeeded >= *n || terminal == ops.len(),
            Combinator::AtMost { .. } => terminal == ops.len(),
        };
        if done {
            let outcome = self.finalize_combinator(combinator);
            self.settle(node, outcome);
        }
    }

    /// Computes a finished combinator's result by re-reading every
    /// operand's recorded outcome — cheap for the small operand lists
    /// combinators realistically carry, and avoids a separate running
    /// tally that could drift from `self.outcomes`.
    fn finalize_combinator(&self, combinator: &Combinator) -> NodeOutcome {
        match combinator {
            Combinator::Gather(ops) => {
                let mut results = Vec::with_capacity(ops.len());
                for op in ops {
                    match self.outcomes.get(op) {
                        Some(Ok(value)) => results.push(value.clone()),
                        Some(Err(e)) => return Err(e.clone()),
                        None => return Err(NodeError::Operation(format!("gather: operand {op} never settled"))),
                    }
                }
                Ok(Value::List(results))
            }
            Combinator::Any(ops) => {
                for op in ops {
                    if let Some(Ok(value)) = self.outcomes.get(op) {
                        return Ok(value.clone());
                    }
                }
                Err(NodeError::Operation("any: every operand failed".to_string()))
            }
            Combinator::AtLeast { n, ops } => {
                let succeeded = ops.iter().filter(|op| matches!(self.outcomes.get(op), Some(Ok(_)))).count();
                Ok(Value::Bool(succeeded >= *n))
            }
            Combinator::AtMost { n, ops } => {
                let succeeded = ops.iter().filter(|op| matches!(self.outcomes.get(op), Some(Ok(_)))).count();
                Ok(Value::Bool(succeeded <= *n))
            }
        }
    }

    /// Substitutes every `Deferred` in `value` with its source node's
    /// resolved value. Only called once every `data_dep` has succeeded,
    /// so the lookup always hits `Some(Ok(_))` in practice; the fallback
    /// is defensive, not a real code path.
    fn resolve_args(&self, value: &Value) -> Value {
        match value {
            Value::Deferred(id) => self.outcomes.get(id).and_then(|o| o.as_ref().ok()).cloned().unwrap_or(Value::Null),
            Value::List(items) => Value::List(items.iter().map(|v| self.resolve_args(v)).collect()),
            Value::Map(entries) => Value::Map(entries.iter().map(|(k, v)| (k.clone(), self.resolve_args(v))).collect()),
            Value::Struct(fields) => Value::Struct(fields.iter().map(|(k, v)| (k.clone(), self.resolve_args(v))).collect()),
            other => other.clone(),
        }
    }

    /// Flips every node that is neither `Running` nor already terminal to
    /// `Cancelled` in one sweep. Running nodes are left to resolve on
    /// their own — each races its driver against the cancellation token,
    /// so they settle promptly without this sweep touching them.
    fn cancel_pending(&mut self, to_dispatch: &mut VecDeque<NodeId>) {
        to_dispatch.clear();
        let ids: Vec<NodeId> = self
            .plan
            .nodes()
            .iter()
            .map(|n| n.id)
            .filter(|id| !self.is_terminal(*id) && self.states.get(id) != Some(&NodeState::Running))
            .collect();
        for id in ids {
            self.settle(id, Err(NodeError::Cancelled));
        }
        // Any dependent discovered here is already covered by the sweep
        // above (it iterates the whole plan, not just direct dependents),
        // so the propagation below only ever finds already-terminal nodes
        // — it exists to keep `terminal_queue` drained, not to dispatch.
        let mut discard = VecDeque::new();
        self.propagate(&mut discard);
    }

    async fn drive(&mut self) {
        let mut to_dispatch: VecDeque<NodeId> = VecDeque::new();

        let mut zero_dep_combinators: Vec<NodeId> =
            self.combinators.iter().filter(|(_, c)| c.ops().is_empty()).map(|(id, _)| *id).collect();
        zero_dep_combinators.sort();
        for id in zero_dep_combinators {
            let outcome = self.finalize_combinator(&self.combinators[&id].clone());
            self.settle(id, outcome);
        }

        let mut zero_dep_ordinary: Vec<NodeId> = self.remaining.iter().filter(|(_, &n)| n == 0).map(|(id, _)| *id).collect();
        zero_dep_ordinary.sort();
        for id in zero_dep_ordinary {
            self.states.insert(id, NodeState::Ready);
            to_dispatch.push_back(id);
        }

        self.propagate(&mut to_dispatch);

        let semaphore = self.executor.config.max_concurrency.map(|n| Arc::new(Semaphore::new(n.max(1))));
        let driver_ctx = Arc::new(DriverContext {
            http_client: self.executor.http_client.clone(),
            handles: Arc::clone(&self.executor.handles),
            config: self.executor.config.clone(),
        });
        let mut join_set: JoinSet<(NodeId, NodeOutcome)> = JoinSet::new();
        let mut task_nodes: HashMap<tokio::task::Id, NodeId> = HashMap::new();

        debug!(nodes = self.plan.len(), "executor run starting");

        loop {
            if self.executor.cancel.is_cancelled() {
                self.cancel_pending(&mut to_dispatch);
            }

            while let Some(id) = to_dispatch.pop_front() {
                let node = self.plan.node(id).expect("to_dispatch only ever names plan nodes");
                let kind = node.kind.clone();
                let args = self.resolve_args(&node.args);

                if kind.may_suspend() {
                    self.states.insert(id, NodeState::Running);
                    self.dispatch_count += 1;
                    spawn_node(&mut join_set, &mut task_nodes, Arc::clone(&driver_ctx), self.executor.cancel.clone(), semaphore.clone(), id, kind, args);
                } else {
                    // Compute/coercion kinds never suspend (§4.D, §5): run
                    // them inline on this task rather than through the
                    // `JoinSet`, so they neither consume a concurrency
                    // permit nor hop to a different worker thread.
                    self.dispatch_count += 1;
                    if self.executor.cancel.is_cancelled() {
                        self.settle(id, Err(NodeError::Cancelled));
                    } else {
                        self.states.insert(id, NodeState::Running);
                        let outcome = dispatch_inline(&driver_ctx, id, &kind, args).await;
                        self.settle(id, outcome);
                    }
                    self.propagate(&mut to_dispatch);
                }
            }

            if join_set.is_empty() {
                break;
            }

            match join_set.join_next().await {
                Some(Ok((id, outcome))) => {
                    self.settle(id, outcome);
                    self.propagate(&mut to_dispatch);
                }
                Some(Err(join_err)) => {
                    // The spawned future itself catches driver panics via
                    // `catch_unwind`, so this only fires if the task was
                    // aborted by the runtime out from under us. Settle the
                    // orphaned node as failed rather than leaving it stuck
                    // in `Running` forever.
                    if let Some(&id) = task_nodes.get(&join_err.id()) {
                        let runtime_err = RuntimeError::TaskJoin { node: id, detail: join_err.to_string() };
                        warn!(error = %runtime_err, "a node task could not be joined");
                        self.settle(id, Err(NodeError::Operation(runtime_err.to_string())));
                        self.propagate(&mut to_dispatch);
                    } else {
                        warn!(error = %join_err, "an unidentified node task could not be joined");
                    }
                }
                None => break,
            }
        }

        debug!(
            total = self.plan.len(),
            succeeded = self.states.values().filter(|s| **s == NodeState::Succeeded).count(),
            failed = self.states.values().filter(|s| **s == NodeState::Failed).count(),
            cancelled = self.states.values().filter(|s| **s == NodeState::Cancelled).count(),
            "executor run finished"
        );
    }

    fn into_report(self) -> ExecutionReport {
        ExecutionReport {
            node_states: self.states,
            outcomes: self.outcomes,
            dispatch_count: self.dispatch_count,
            dependency_failures: self.dependency_failures,
        }
    }
}

/// Runs a non-suspending kind's driver directly on the calling task — no
/// `JoinSet` hop, no semaphore permit. Still panic-safe: a compute driver
/// is plain sync logic wrapped in an `async fn` by [`drivers::dispatch`],
/// but a bad coercion (e.g. an overflowing cast) could still panic.
async fn dispatch_inline(ctx: &DriverContext, id: NodeId, kind: &NodeKind, args: Value) -> NodeOutcome {
    let body = AssertUnwindSafe(drivers::dispatch(ctx, kind, args));
    match body.catch_unwind().await {
        Ok(outcome) => outcome,
        Err(_) => Err(NodeError::Operation(format!("node {id} driver panicked"))),
    }
}

fn spawn_node(
    join_set: &mut JoinSet<(NodeId, NodeOutcome)>,
    task_nodes: &mut HashMap<tokio::task::Id, NodeId>,
    ctx: Arc<DriverContext>,
    cancel: CancellationToken,
    semaphore: Option<Arc<Semaphore>>,
    id: NodeId,
    kind: NodeKind,
    args: Value,
) {
    let handle = join_set.spawn(async move {
        let body = AssertUnwindSafe(async {
            let _permit = match &semaphore {
                Some(sem) => sem.clone().acquire_owned().await.ok(),
                None => None,
            };
            if cancel.is_cancelled() {
                return Err(NodeError::Cancelled);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(NodeError::Cancelled),
                result = drivers::dispatch(&ctx, &kind, args) => result,
            }
        });
        let outcome = match body.catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => Err(NodeError::Operation(format!("node {id} driver task panicked"))),
        };
        (id, outcome)
    });
    task_nodes.insert(handle.id(), id);
}
