//! Event-source drivers — `event_source`, `event_write`, `event_poll`,
//! `event_source_close`. These forward into [`crate::event_source::HandleTable`];
//! the table owns the actual socket state and background pump tasks.

use super::{field, op_error};
use crate::event_source::HandleTable;
use blueprint_kernel::error::NodeError;
use blueprint_kernel::node::HandleId;
use blueprint_kernel::Value;
use std::sync::Arc;

fn handle_of(args: &Value, field_name: &str) -> Result<HandleId, NodeError> {
    match field(args, field_name) {
        Some(Value::Int(raw)) if *raw >= 0 => Ok(HandleId::new(*raw as u32)),
        other => Err(op_error(format!("expected `{field_name}` to be a handle (non-negative int), got {other:?}"))),
    }
}

fn content_bytes(value: &Value) -> Result<Vec<u8>, NodeError> {
    match value {
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Bytes(b) => Ok(b.clone()),
        other => Err(op_error(format!("event_write: `data` must be a string or bytes, got {other:?}"))),
    }
}

pub async fn event_source(handles: &Arc<HandleTable>, args: Value, buffer_size: usize) -> Result<Value, NodeError> {
    let kind = match field(&args, "kind") {
        Some(Value::String(s)) => s.clone(),
        other => return Err(op_error(format!("event_source: `kind` must be a string, got {other:?}"))),
    };
    let params = field(&args, "params").cloned().unwrap_or(Value::Null);
    let handle = HandleTable::open(handles, &kind, &params, buffer_size).await?;
    Ok(Value::Int(handle.as_u32() as i64))
}

pub async fn event_write(handles: &Arc<HandleTable>, args: Value) -> Result<Value, NodeError> {
    let handle = handle_of(&args, "handle")?;
    let data = content_bytes(field(&args, "data").unwrap_or(&Value::Null))?;
    let destination = field(&args, "destination").filter(|v| !matches!(v, Value::Null));
    handles.write(handle, &data, destination).await?;
    Ok(Value::Null)
}

pub async fn event_poll(handles: &Arc<HandleTable>, args: Value) -> Result<Value, NodeError> {
    let handle_values = match field(&args, "handles") {
        Some(Value::List(items)) => items,
        other => return Err(op_error(format!("event_poll: `handles` must be a list, got {other:?}"))),
    };
    let mut ids = Vec::with_capacity(handle_values.len());
    for item in handle_values {
        match item {
            Value::Int(raw) if *raw >= 0 => ids.push(HandleId::new(*raw as u32)),
            other => return Err(op_error(format!("event_poll: every handle must be a non-negative int, got {other:?}"))),
        }
    }

    let timeout_ms = match field(&args, "timeout_ms") {
        Some(Value::Int(ms)) if *ms >= 0 => Some(*ms as u64),
        Some(Value::Null) | None => None,
        other => return Err(op_error(format!("event_poll: `timeout_ms` must be a non-negative int or null, got {other:?}"))),
    };

    Ok(handles.poll(&ids, timeout_ms).await?.unwrap_or(Value::Null))
}

pub async fn event_source_close(handles: &Arc<HandleTable>, args: Value) -> Result<Value, NodeError> {
    let handle = handle_of(&args, "handle")?;
    handles.close(handle).await?;
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn struct_args(fields: Vec<(&str, Value)>) -> Value {
        let mut map = BTreeMap::new();
        for (k, v) in fields {
            map.insert(k.to_string(), v);
        }
        Value::Struct(map)
    }

    #[tokio::test]
    async fn closing_a_handle_that_was_never_opened_is_an_operation_error() {
        let handles = Arc::new(HandleTable::new());
        let err = event_source_close(&handles, struct_args(vec![("handle", Value::Int(7))])).await.unwrap_err();
        assert!(matches!(err, NodeError::Operation(_)));
    }

    #[tokio::test]
    async fn event_poll_rejects_a_non_list_handles_field() {
        let handles = Arc::new(HandleTable::new());
        let err = event_poll(&handles, struct_args(vec![("handles", Value::Int(1)), ("timeout_ms", Value::Null)]))
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::Operation(_)));
    }
}
