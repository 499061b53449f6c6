//! The intrinsic binding surface: the fixed set of script-callable
//! primitives that allocate plan nodes.
//!
//! Every function here takes a `&mut PlanBuilder` plus materialized-or-
//! deferred [`Value`] arguments and returns a [`Deferred`] wrapping the
//! newly allocated node, matching the `__bp_*` surface the script host
//! calls against. Argument validation runs here only when the operand is
//! already materialized (not a `Deferred`); a deferred operand always
//! defers validation to the driver at execution time.
//!
//! I/O-with-side-effects kinds (`write_file`, `exec`, console output,
//! event ops, ...) are marked root automatically, matching the
//! "implicitly for every node whose result is discarded but whose side
//! effects are observable" rule for `mark_root`.

use crate::error::ScriptError;
use crate::node::{NodeKind, Span};
use crate::plan::PlanBuilder;
use crate::value::{Deferred, Value};
use std::collections::BTreeMap;

fn struct_args(fields: Vec<(&'static str, Value)>) -> Value {
    let mut map = BTreeMap::new();
    for (k, v) in fields {
        map.insert(k.to_string(), v);
    }
    Value::Struct(map)
}

/// Validates that a materialized argument is a string; a `Deferred`
/// argument is passed through untouched (validated at execution time).
fn expect_string_if_materialized(
    intrinsic: &'static str,
    argument: &'static str,
    v: &Value,
) -> Result<(), ScriptError> {
    match v {
        Value::Deferred(_) => Ok(()),
        Value::String(_) => Ok(()),
        other => Err(ScriptError::InvalidArgument {
            intrinsic,
            argument,
            detail: format!("expected string, got {other:?}"),
        }),
    }
}

fn expect_int_if_materialized(
    intrinsic: &'static str,
    argument: &'static str,
    v: &Value,
) -> Result<(), ScriptError> {
    match v {
        Value::Deferred(_) => Ok(()),
        Value::Int(_) => Ok(()),
        other => Err(ScriptError::InvalidArgument {
            intrinsic,
            argument,
            detail: format!("expected int, got {other:?}"),
        }),
    }
}

macro_rules! alloc_root {
    ($b:expr, $kind:expr, $args:expr, $span:expr) => {{
        let id = $b.new_node($kind, $args, $span)?;
        $b.mark_root(id)?;
        Ok(Deferred(id))
    }};
}

macro_rules! alloc {
    ($b:expr, $kind:expr, $args:expr, $span:expr) => {{
        let id = $b.new_node($kind, $args, $span)?;
        Ok(Deferred(id))
    }};
}

// ---------------------------------------------------------------------
// File I/O
// ---------------------------------------------------------------------

pub fn read_file(
    b: &mut PlanBuilder,
    path: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("read_file", "path", &path)?;
    alloc_root!(b, NodeKind::ReadFile, struct_args(vec![("path", path)]), span)
}

pub fn write_file(
    b: &mut PlanBuilder,
    path: Value,
    content: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("write_file", "path", &path)?;
    alloc_root!(
        b,
        NodeKind::WriteFile,
        struct_args(vec![("path", path), ("content", content)]),
        span
    )
}

pub fn append_file(
    b: &mut PlanBuilder,
    path: Value,
    content: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("append_file", "path", &path)?;
    alloc_root!(
        b,
        NodeKind::AppendFile,
        struct_args(vec![("path", path), ("content", content)]),
        span
    )
}

pub fn delete_file(
    b: &mut PlanBuilder,
    path: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("delete_file", "path", &path)?;
    alloc_root!(b, NodeKind::DeleteFile, struct_args(vec![("path", path)]), span)
}

pub fn file_exists(
    b: &mut PlanBuilder,
    path: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("file_exists", "path", &path)?;
    alloc!(b, NodeKind::FileExists, struct_args(vec![("path", path)]), span)
}

pub fn is_file(
    b: &mut PlanBuilder,
    path: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("is_file", "path", &path)?;
    alloc!(b, NodeKind::IsFile, struct_args(vec![("path", path)]), span)
}

pub fn is_dir(
    b: &mut PlanBuilder,
    path: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("is_dir", "path", &path)?;
    alloc!(b, NodeKind::IsDir, struct_args(vec![("path", path)]), span)
}

pub fn mkdir(
    b: &mut PlanBuilder,
    path: Value,
    recursive: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("mkdir", "path", &path)?;
    alloc_root!(
        b,
        NodeKind::Mkdir,
        struct_args(vec![("path", path), ("recursive", recursive)]),
        span
    )
}

pub fn rmdir(
    b: &mut PlanBuilder,
    path: Value,
    recursive: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("rmdir", "path", &path)?;
    alloc_root!(
        b,
        NodeKind::Rmdir,
        struct_args(vec![("path", path), ("recursive", recursive)]),
        span
    )
}

pub fn list_dir(
    b: &mut PlanBuilder,
    path: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("list_dir", "path", &path)?;
    alloc!(b, NodeKind::ListDir, struct_args(vec![("path", path)]), span)
}

pub fn copy_file(
    b: &mut PlanBuilder,
    src: Value,
    dst: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("copy_file", "src", &src)?;
    expect_string_if_materialized("copy_file", "dst", &dst)?;
    alloc_root!(
        b,
        NodeKind::CopyFile,
        struct_args(vec![("src", src), ("dst", dst)]),
        span
    )
}

pub fn move_file(
    b: &mut PlanBuilder,
    src: Value,
    dst: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("move_file", "src", &src)?;
    expect_string_if_materialized("move_file", "dst", &dst)?;
    alloc_root!(
        b,
        NodeKind::MoveFile,
        struct_args(vec![("src", src), ("dst", dst)]),
        span
    )
}

pub fn file_size(
    b: &mut PlanBuilder,
    path: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("file_size", "path", &path)?;
    alloc!(b, NodeKind::FileSize, struct_args(vec![("path", path)]), span)
}

// ---------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------

/// `headers` is `Value::Map` (possibly empty); `body` is `Value::Null`
/// when absent. Non-2xx status is not an `OperationError` — it resolves
/// to a successful `{status, headers, body}` struct, per the resolved
/// open question.
pub fn http_request(
    b: &mut PlanBuilder,
    method: Value,
    url: Value,
    headers: Value,
    body: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("http_request", "method", &method)?;
    expect_string_if_materialized("http_request", "url", &url)?;
    alloc_root!(
        b,
        NodeKind::HttpRequest,
        struct_args(vec![
            ("method", method),
            ("url", url),
            ("headers", headers),
            ("body", body),
        ]),
        span
    )
}

// ---------------------------------------------------------------------
// Process
// ---------------------------------------------------------------------

pub fn exec(
    b: &mut PlanBuilder,
    argv: Value,
    cwd: Value,
    env: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    if let Value::List(items) = &argv {
        if items.is_empty() {
            return Err(ScriptError::InvalidArgument {
                intrinsic: "exec",
                argument: "argv",
                detail: "argv must have at least one element".into(),
            });
        }
    } else if !argv.is_deferred() {
        return Err(ScriptError::InvalidArgument {
            intrinsic: "exec",
            argument: "argv",
            detail: format!("expected list, got {argv:?}"),
        });
    }
    alloc_root!(
        b,
        NodeKind::Exec,
        struct_args(vec![("argv", argv), ("cwd", cwd), ("env", env)]),
        span
    )
}

pub fn env_get(
    b: &mut PlanBuilder,
    name: Value,
    default: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("env_get", "name", &name)?;
    alloc!(
        b,
        NodeKind::EnvGet,
        struct_args(vec![("name", name), ("default", default)]),
        span
    )
}

// ---------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------

pub fn sleep(
    b: &mut PlanBuilder,
    seconds: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    match &seconds {
        Value::Int(_) | Value::Float(_) | Value::Deferred(_) => {}
        other => {
            return Err(ScriptError::InvalidArgument {
                intrinsic: "sleep",
                argument: "seconds",
                detail: format!("expected number, got {other:?}"),
            })
        }
    }
    alloc_root!(b, NodeKind::Sleep, struct_args(vec![("seconds", seconds)]), span)
}

pub fn now(b: &mut PlanBuilder, span: Option<Span>) -> Result<Deferred, ScriptError> {
    alloc!(b, NodeKind::Now, Value::Null, span)
}

// ---------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------

pub fn json_encode(
    b: &mut PlanBuilder,
    value: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    alloc!(b, NodeKind::JsonEncode, struct_args(vec![("value", value)]), span)
}

pub fn json_decode(
    b: &mut PlanBuilder,
    text: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("json_decode", "text", &text)?;
    alloc!(b, NodeKind::JsonDecode, struct_args(vec![("text", text)]), span)
}

// ---------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------

pub fn stdout(
    b: &mut PlanBuilder,
    parts: Vec<Value>,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    alloc_root!(b, NodeKind::Stdout, Value::List(parts), span)
}

pub fn stderr(
    b: &mut PlanBuilder,
    parts: Vec<Value>,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    alloc_root!(b, NodeKind::Stderr, Value::List(parts), span)
}

// ---------------------------------------------------------------------
// Event source
// ---------------------------------------------------------------------

/// `kind` names the source flavor (`tcp_connect`, `tcp_listen`, `udp`,
/// `unix_connect`, `unix_listen`); `params` is a struct of kind-specific
/// parameters (host/port, bind address, path). The result is an opaque
/// handle value, not a `Deferred` that carries data — `event_write`,
/// `event_poll`, and `event_source_close` pass the resolved handle as an
/// ordinary argument once this node has succeeded.
pub fn event_source(
    b: &mut PlanBuilder,
    kind: Value,
    params: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    expect_string_if_materialized("event_source", "kind", &kind)?;
    alloc_root!(
        b,
        NodeKind::EventSource,
        struct_args(vec![("kind", kind), ("params", params)]),
        span
    )
}

pub fn event_write(
    b: &mut PlanBuilder,
    handle: Value,
    data: Value,
    destination: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    alloc_root!(
        b,
        NodeKind::EventWrite,
        struct_args(vec![("handle", handle), ("data", data), ("destination", destination)]),
        span
    )
}

/// `handles` is a list of handle values; `event_poll` resolves on the
/// first available event across all of them, or `Value::Null` on
/// timeout. There is no fanout: concurrent pollers on the same handle
/// consume events first-come, first-served.
pub fn event_poll(
    b: &mut PlanBuilder,
    handles: Value,
    timeout_ms: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    if !matches!(handles, Value::List(_) | Value::Deferred(_)) {
        return Err(ScriptError::InvalidArgument {
            intrinsic: "event_poll",
            argument: "handles",
            detail: format!("expected list, got {handles:?}"),
        });
    }
    expect_int_if_materialized("event_poll", "timeout_ms", &timeout_ms)?;
    alloc_root!(
        b,
        NodeKind::EventPoll,
        struct_args(vec![("handles", handles), ("timeout_ms", timeout_ms)]),
        span
    )
}

pub fn event_source_close(
    b: &mut PlanBuilder,
    handle: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    alloc_root!(
        b,
        NodeKind::EventSourceClose,
        struct_args(vec![("handle", handle)]),
        span
    )
}

// ---------------------------------------------------------------------
// Compute (arithmetic / comparison / coercion)
// ---------------------------------------------------------------------

fn binary(
    b: &mut PlanBuilder,
    kind: NodeKind,
    lhs: Value,
    rhs: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    alloc!(b, kind, struct_args(vec![("lhs", lhs), ("rhs", rhs)]), span)
}

fn unary(
    b: &mut PlanBuilder,
    kind: NodeKind,
    operand: Value,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    alloc!(b, kind, struct_args(vec![("operand", operand)]), span)
}

macro_rules! binary_ops {
    ($($fn_name:ident => $kind:ident),+ $(,)?) => {
        $(
            pub fn $fn_name(
                b: &mut PlanBuilder,
                lhs: Value,
                rhs: Value,
                span: Option<Span>,
            ) -> Result<Deferred, ScriptError> {
                binary(b, NodeKind::$kind, lhs, rhs, span)
            }
        )+
    };
}

macro_rules! unary_ops {
    ($($fn_name:ident => $kind:ident),+ $(,)?) => {
        $(
            pub fn $fn_name(
                b: &mut PlanBuilder,
                operand: Value,
                span: Option<Span>,
            ) -> Result<Deferred, ScriptError> {
                unary(b, NodeKind::$kind, operand, span)
            }
        )+
    };
}

binary_ops! {
    add => Add,
    sub => Sub,
    mul => Mul,
    div => Div,
    floor_div => FloorDiv,
    rem => Mod,
    eq => Eq,
    ne => Ne,
    lt => Lt,
    le => Le,
    gt => Gt,
    ge => Ge,
    concat => Concat,
    contains => Contains,
}

unary_ops! {
    neg => Neg,
    not => Not,
    to_bool => ToBool,
    to_int => ToInt,
    to_float => ToFloat,
    to_str => ToStr,
    len => Len,
}

// ---------------------------------------------------------------------
// Composition combinators
// ---------------------------------------------------------------------

/// `gather(ops)` — ready once every listed op is terminal; fails if any
/// op failed. `gather([])` is valid and resolves to `List([])`.
pub fn gather(
    b: &mut PlanBuilder,
    ops: Vec<Deferred>,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    let args = Value::List(ops.into_iter().map(Value::from).collect());
    alloc_root!(b, NodeKind::Gather, args, span)
}

/// `any(ops)` (also exposed to scripts as `race`) — ready on the first
/// op to succeed; fails only if every op fails.
pub fn any(
    b: &mut PlanBuilder,
    ops: Vec<Deferred>,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    if ops.is_empty() {
        return Err(ScriptError::InvalidCombinator {
            combinator: "any",
            detail: "requires at least one operand".into(),
        });
    }
    let args = Value::List(ops.into_iter().map(Value::from).collect());
    alloc_root!(b, NodeKind::Any, args, span)
}

/// `at_least(n, ops)` — never fails on individual op failure; resolves
/// to `Bool(true)` iff at least `n` ops succeeded.
pub fn at_least(
    b: &mut PlanBuilder,
    n: i64,
    ops: Vec<Deferred>,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    if n < 0 || n as usize > ops.len() {
        return Err(ScriptError::InvalidCombinator {
            combinator: "at_least",
            detail: format!("n={n} exceeds operand count {}", ops.len()),
        });
    }
    let args = struct_args(vec![
        ("n", Value::Int(n)),
        ("ops", Value::List(ops.into_iter().map(Value::from).collect())),
    ]);
    alloc_root!(b, NodeKind::AtLeast, args, span)
}

/// `at_most(n, ops)` — resolves to `Bool(true)` iff at most `n` ops
/// succeeded, computed once all ops are terminal.
pub fn at_most(
    b: &mut PlanBuilder,
    n: i64,
    ops: Vec<Deferred>,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    if n < 0 {
        return Err(ScriptError::InvalidCombinator {
            combinator: "at_most",
            detail: format!("n={n} must be non-negative"),
        });
    }
    let args = struct_args(vec![
        ("n", Value::Int(n)),
        ("ops", Value::List(ops.into_iter().map(Value::from).collect())),
    ]);
    alloc_root!(b, NodeKind::AtMost, args, span)
}

/// `after(x, y)` — `y` itself gains an `order_dep` on `x`: `y`'s own node
/// does not become `Ready` until `x` has succeeded, and the returned
/// `Deferred` is `y` unchanged, so `y`'s value is untouched. No new node
/// is allocated — wrapping `y` in a pass-through node would only delay
/// the *wrapper's* completion, not `y`'s own dispatch, which is what the
/// ordering guarantee actually requires (a writer must finish before a
/// reader of the same resource starts, not just before some bookkeeping
/// node resolves).
///
/// `x` must have been constructed before `y` (construction order is how
/// this graph stays acyclic without a runtime check); calling `after`
/// with `y` constructed first is rejected with `UnknownNode`.
pub fn after(
    b: &mut PlanBuilder,
    x: Deferred,
    y: Deferred,
    _span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    b.add_order_edge(y.node_id(), x.node_id())?;
    b.mark_root(y.node_id())?;
    Ok(y)
}

/// `sequence(ops)` desugars at construction time into a chain of
/// `order_dep`s — `ops[i]` gains an order dependency directly on
/// `ops[i-1]` — followed by a `gather` over the (untouched) operands, so
/// the executor never sees a dedicated `sequence` kind and each op's own
/// dispatch, not a wrapper's, is what waits on its predecessor.
pub fn sequence(
    b: &mut PlanBuilder,
    ops: Vec<Deferred>,
    span: Option<Span>,
) -> Result<Deferred, ScriptError> {
    for pair in ops.windows(2) {
        b.add_order_edge(pair[1].node_id(), pair[0].node_id())?;
    }
    gather(b, ops, span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_of_empty_is_allowed() {
        let mut b = PlanBuilder::new();
        let d = gather(&mut b, vec![], None).unwrap();
        let plan = b.freeze();
        assert!(matches!(plan.node(d.node_id()).unwrap().args, Value::List(ref v) if v.is_empty()));
    }

    #[test]
    fn any_rejects_empty_operands() {
        let mut b = PlanBuilder::new();
        let err = any(&mut b, vec![], None).unwrap_err();
        assert!(matches!(err, ScriptError::InvalidCombinator { .. }));
    }

    #[test]
    fn at_least_rejects_n_greater_than_operand_count() {
        let mut b = PlanBuilder::new();
        let a = now(&mut b, None).unwrap();
        let err = at_least(&mut b, 5, vec![a], None).unwrap_err();
        assert!(matches!(err, ScriptError::InvalidCombinator { .. }));
    }

    #[test]
    fn after_adds_order_dep_directly_to_y_and_returns_y_unchanged() {
        let mut b = PlanBuilder::new();
        let x = now(&mut b, None).unwrap();
        let y = now(&mut b, None).unwrap();
        let r = after(&mut b, x, y, None).unwrap();
        assert_eq!(r.node_id(), y.node_id());
        let plan = b.freeze();
        let node = plan.node(r.node_id()).unwrap();
        assert_eq!(node.order_deps, vec![x.node_id()]);
        assert!(node.data_deps.is_empty());
    }

    #[test]
    fn after_rejects_y_constructed_before_x() {
        let mut b = PlanBuilder::new();
        let y = now(&mut b, None).unwrap();
        let x = now(&mut b, None).unwrap();
        let err = after(&mut b, x, y, None).unwrap_err();
        assert!(matches!(err, ScriptError::UnknownNode(_)));
    }

    #[test]
    fn sequence_of_one_is_a_trivial_chain() {
        let mut b = PlanBuilder::new();
        let a = now(&mut b, None).unwrap();
        let d = sequence(&mut b, vec![a], None).unwrap();
        let plan = b.freeze();
        let gather_node = plan.node(d.node_id()).unwrap();
        assert_eq!(gather_node.kind, NodeKind::Gather);
        assert_eq!(gather_node.data_deps, vec![a.node_id()]);
        assert!(plan.node(a.node_id()).unwrap().order_deps.is_empty());
    }

    #[test]
    fn sequence_of_many_chains_order_deps_directly_onto_each_op() {
        let mut b = PlanBuilder::new();
        let ops: Vec<Deferred> = (0..4).map(|_| now(&mut b, None).unwrap()).collect();
        let result = sequence(&mut b, ops.clone(), None).unwrap();
        let plan = b.freeze();

        let gathered = plan.node(result.node_id()).unwrap();
        assert_eq!(gathered.kind, NodeKind::Gather);
        assert_eq!(gathered.data_deps.len(), 4);

        assert!(plan.node(ops[0].node_id()).unwrap().order_deps.is_empty());
        for i in 1..ops.len() {
            assert_eq!(plan.node(ops[i].node_id()).unwrap().order_deps, vec![ops[i - 1].node_id()]);
        }
    }

    #[test]
    fn exec_rejects_empty_argv() {
        let mut b = PlanBuilder::new();
        let err = exec(&mut b, Value::List(vec![]), Value::Null, Value::Null, None).unwrap_err();
        assert!(matches!(err, ScriptError::InvalidArgument { argument: "argv", .. }));
    }

    #[test]
    fn read_file_rejects_non_string_materialized_path() {
        let mut b = PlanBuilder::new();
        let err = read_file(&mut b, Value::Int(1), None).unwrap_err();
        assert!(matches!(err, ScriptError::InvalidArgument { argument: "path", .. }));
    }

    #[test]
    fn read_file_defers_validation_for_deferred_path() {
        let mut b = PlanBuilder::new();
        let p = now(&mut b, None).unwrap();
        let d = read_file(&mut b, Value::from(p), None).unwrap();
        let plan = b.freeze();
        assert_eq!(plan.node(d.node_id()).unwrap().data_deps, vec![p.node_id()]);
    }
}
