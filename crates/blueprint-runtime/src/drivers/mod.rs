//! Kind drivers: the per-`NodeKind` logic that turns a ready node's
//! resolved arguments into a terminal result.
//!
//! Each driver receives `args` with every `Deferred` already substituted
//! for its source node's value (the scheduler only dispatches a node once
//! every `data_dep` has succeeded) and returns a
//! [`blueprint_kernel::error::NodeError`] on failure — the structured
//! error a node carries in its `Failed` state.

pub mod compute;
pub mod console;
pub mod event;
pub mod file;
pub mod http;
pub mod json;
pub mod process;
pub mod timer;

use crate::event_source::HandleTable;
use blueprint_kernel::error::NodeError;
use blueprint_kernel::{NodeKind, Value};
use std::sync::Arc;

/// Reads a named field out of a `Value::Struct`, the shape every
/// intrinsic in `blueprint-kernel::intrinsics` uses for multi-argument
/// node kinds.
pub(crate) fn field<'a>(args: &'a Value, name: &str) -> Option<&'a Value> {
    match args {
        Value::Struct(fields) => fields.get(name),
        _ => None,
    }
}

/// Takes ownership of a named field out of a `Value::Struct`, defaulting
/// to `Value::Null` if absent.
pub(crate) fn take_field(args: &mut Value, name: &str) -> Value {
    match args {
        Value::Struct(fields) => fields.remove(name).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

pub(crate) fn op_error(detail: impl Into<String>) -> NodeError {
    NodeError::Operation(detail.into())
}

pub(crate) fn expect_string(kind: &'static str, field_name: &'static str, v: &Value) -> Result<String, NodeError> {
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| op_error(format!("`{kind}`: `{field_name}` resolved to a non-string value: {v:?}")))
}

pub(crate) fn expect_number(kind: &'static str, field_name: &'static str, v: &Value) -> Result<f64, NodeError> {
    v.as_float()
        .ok_or_else(|| op_error(format!("`{kind}`: `{field_name}` resolved to a non-numeric value: {v:?}")))
}

/// Runtime shared across every driver dispatch: the HTTP client
/// (connection pooling is the client's concern, per the component
/// design) and the event-source handle table.
#[derive(Clone)]
pub struct DriverContext {
    pub http_client: ::reqwest::Client,
    pub handles: Arc<HandleTable>,
    pub config: crate::config::ExecutorConfig,
}

/// Dispatches a ready, non-combinator node to its kind driver.
///
/// `Gather`/`Any`/`AtLeast`/`AtMost` never reach this function — their
/// readiness rule and result are computed directly by the scheduler (see
/// `crate::executor::combinator`), matching "Composition — see §4.E" in
/// the node-kind catalogue. `after`/`sequence` never reach here either:
/// they add an `order_dep` directly to an already-existing node instead
/// of allocating a kind of their own.
pub async fn dispatch(ctx: &DriverContext, kind: &NodeKind, args: Value) -> Result<Value, NodeError> {
    match kind {
        NodeKind::ReadFile => file::read_file(args).await,
        NodeKind::WriteFile => file::write_file(args).await,
        NodeKind::AppendFile => file::append_file(args).await,
        NodeKind::DeleteFile => file::delete_file(args).await,
        NodeKind::FileExists => file::file_exists(args).await,
        NodeKind::IsFile => file::is_file(args).await,
        NodeKind::IsDir => file::is_dir(args).await,
        NodeKind::Mkdir => file::mkdir(args).await,
        NodeKind::Rmdir => file::rmdir(args).await,
        NodeKind::ListDir => file::list_dir(args).await,
        NodeKind::CopyFile => file::copy_file(args).await,
        NodeKind::MoveFile => file::move_file(args).await,
        NodeKind::FileSize => file::file_size(args).await,

        NodeKind::HttpRequest => http::http_request(&ctx.http_client, args, ctx.config.default_http_timeout_ms).await,

        NodeKind::Exec => process::exec(args).await,
        NodeKind::EnvGet => process::env_get(args),

        NodeKind::Sleep => timer::sleep(args).await,
        NodeKind::Now => timer::now(),

        NodeKind::JsonEncode => json::json_encode(args),
        NodeKind::JsonDecode => json::json_decode(args),

        NodeKind::Stdout => console::stdout(args),
        NodeKind::Stderr => console::stderr(args),

        NodeKind::EventSource => event::event_source(&ctx.handles, args, ctx.config.event_buffer_size).await,
        NodeKind::EventWrite => event::event_write(&ctx.handles, args).await,
        NodeKind::EventPoll => event::event_poll(&ctx.handles, args).await,
        NodeKind::EventSourceClose => event::event_source_close(&ctx.handles, args).await,

        NodeKind::Add => compute::add(args),
        NodeKind::Sub => compute::sub(args),
        NodeKind::Mul => compute::mul(args),
        NodeKind::Div => compute::div(args),
        NodeKind::FloorDiv => compute::floor_div(args),
        NodeKind::Mod => compute::rem(args),
        NodeKind::Neg => compute::neg(args),
        NodeKind::Eq => compute::eq(args),
        NodeKind::Ne => compute::ne(args),
        NodeKind::Lt => compute::lt(args),
        NodeKind::Le => compute::le(args),
        NodeKind::Gt => compute::gt(args),
        NodeKind::Ge => compute::ge(args),
        NodeKind::Not => compute::not(args),
        NodeKind::Concat => compute::concat(args),
        NodeKind::Contains => compute::contains(args),
        NodeKind::ToBool => compute::to_bool(args),
        NodeKind::ToInt => compute::to_int(args),
        NodeKind::ToFloat => compute::to_float(args),
        NodeKind::ToStr => compute::to_str(args),
        NodeKind::Len => compute::len(args),

        NodeKind::Gather | NodeKind::Any | NodeKind::AtLeast | NodeKind::AtMost => {
            unreachable!("combinator kinds are resolved by the scheduler, not dispatched to a driver")
        }
    }
}
