//! The event-source handle table.
//!
//! `event_source` opens a long-lived resource (a TCP/UDP/Unix socket) and
//! returns an opaque handle; `event_write`, `event_poll`, and
//! `event_source_close` operate on that handle afterward as ordinary,
//! non-suspending-at-the-plan-level arguments. The table is the single
//! place all of that live state lives — the executor owns one
//! [`HandleTable`] for the lifetime of a run and every driver call borrows
//! it through [`super::drivers::DriverContext`].
//!
//! Listener sources (`tcp_listen`, `unix_listen`) spawn an accept loop
//! that registers each accepted connection into the same table and
//! reports it as an `Accept` event on the listener's own queue — the
//! listener handle and its accepted connections are peers in the table,
//! not parent/child.

pub mod tcp;
pub mod udp;
pub mod unix;

use blueprint_kernel::error::NodeError;
use blueprint_kernel::node::HandleId;
use blueprint_kernel::Value;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

/// A single event surfaced by a source's background task.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    Data(Vec<u8>),
    Accept(HandleId),
    Closed,
    Error(String),
}

impl SourceEvent {
    fn into_value(self, handle: HandleId) -> Value {
        let (ty, data) = match self {
            SourceEvent::Data(bytes) => ("data", Value::Bytes(bytes)),
            SourceEvent::Accept(accepted) => ("accept", Value::Int(accepted.as_u32() as i64)),
            SourceEvent::Closed => ("closed", Value::Null),
            SourceEvent::Error(detail) => ("error", Value::String(detail)),
        };
        let mut fields = BTreeMap::new();
        fields.insert("handle".to_string(), Value::Int(handle.as_u32() as i64));
        fields.insert("type".to_string(), Value::String(ty.to_string()));
        fields.insert("data".to_string(), data);
        Value::Struct(fields)
    }
}

/// The write side of a handle, if it has one. Listener handles accept
/// connections but never carry data themselves, so they hold `None`.
pub(crate) enum Writer {
    None,
    Tcp(AsyncMutex<tokio::net::tcp::OwnedWriteHalf>),
    Udp(Arc<tokio::net::UdpSocket>),
    Unix(AsyncMutex<tokio::net::unix::OwnedWriteHalf>),
}

/// What a per-kind `open` returns before it has a [`HandleId`] assigned.
pub(crate) struct Source {
    pub writer: Writer,
    pub events: mpsc::Receiver<SourceEvent>,
    pub tasks: Vec<JoinHandle<()>>,
}

struct Entry {
    events: AsyncMutex<mpsc::Receiver<SourceEvent>>,
    writer: Writer,
    tasks: Vec<JoinHandle<()>>,
}

pub struct HandleTable {
    next: AtomicU32,
    entries: DashMap<HandleId, Entry>,
    /// Tombstones for handles that were explicitly closed, so later ops
    /// on them get a distinct `closed` error instead of being
    /// indistinguishable from a handle that never existed.
    closed: DashMap<HandleId, ()>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        HandleTable { next: AtomicU32::new(1), entries: DashMap::new(), closed: DashMap::new() }
    }

    fn closed_error(handle: HandleId, op: &'static str) -> NodeError {
        NodeError::Operation(format!("{op}: handle {handle} is closed"))
    }

    fn alloc_id(&self) -> HandleId {
        HandleId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }

    fn insert(&self, source: Source) -> HandleId {
        let id = self.alloc_id();
        self.entries.insert(
            id,
            Entry { events: AsyncMutex::new(source.events), writer: source.writer, tasks: source.tasks },
        );
        id
    }

    /// Registers a connection accepted by a listener's background task.
    /// Called from inside that task, which holds an `Arc<HandleTable>`.
    pub(crate) fn register_accepted(&self, writer: Writer, events: mpsc::Receiver<SourceEvent>, tasks: Vec<JoinHandle<()>>) -> HandleId {
        self.insert(Source { writer, events, tasks })
    }

    pub async fn open(table: &Arc<HandleTable>, kind: &str, params: &Value, buffer_size: usize) -> Result<HandleId, NodeError> {
        let source = match kind {
            "tcp_connect" => tcp::connect(params, buffer_size).await?,
            "tcp_listen" => tcp::listen(params, buffer_size, Arc::clone(table)).await?,
            "udp" => udp::open(params, buffer_size).await?,
            "unix_connect" => unix::connect(params, buffer_size).await?,
            "unix_listen" => unix::listen(params, buffer_size, Arc::clone(table)).await?,
            other => return Err(NodeError::Operation(format!("event_source: unknown source kind `{other}`"))),
        };
        Ok(table.insert(source))
    }

    pub async fn write(&self, handle: HandleId, data: &[u8], destination: Option<&Value>) -> Result<(), NodeError> {
        if self.closed.contains_key(&handle) {
            return Err(Self::closed_error(handle, "event_write"));
        }
        let entry = self
            .entries
            .get(&handle)
            .ok_or_else(|| NodeError::Operation(format!("event_write: unknown handle {handle}")))?;
        use tokio::io::AsyncWriteExt;
        match &entry.writer {
            Writer::None => Err(NodeError::Operation(format!("event_write: handle {handle} does not accept writes"))),
            Writer::Tcp(writer) => writer
                .lock()
                .await
                .write_all(data)
                .await
                .map_err(|e| NodeError::Operation(format!("event_write: {e}"))),
            Writer::Unix(writer) => writer
                .lock()
                .await
                .write_all(data)
                .await
                .map_err(|e| NodeError::Operation(format!("event_write: {e}"))),
            Writer::Udp(socket) => {
                let addr = destination
                    .and_then(Value::as_str)
                    .ok_or_else(|| NodeError::Operation("event_write: udp handles require a string `destination`".to_string()))?;
                socket
                    .send_to(data, addr)
                    .await
                    .map(|_| ())
                    .map_err(|e| NodeError::Operation(format!("event_write: {e}")))
            }
        }
    }

    /// Waits for the first event across `handles`, or `None` on timeout.
    /// Polls each handle's queue on a short interval rather than a single
    /// merged future — `try_lock` means a handle already being drained by
    /// another poller is simply skipped this tick, which is what gives
    /// first-come-first-served consumption without fanout.
    pub async fn poll(&self, handles: &[HandleId], timeout_ms: Option<u64>) -> Result<Option<Value>, NodeError> {
        for &id in handles {
            if self.closed.contains_key(&id) {
                return Err(Self::closed_error(id, "event_poll"));
            }
            if !self.entries.contains_key(&id) {
                return Err(NodeError::Operation(format!("event_poll: unknown handle {id}")));
            }
        }

        let deadline = timeout_ms.map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));
        loop {
            for &id in handles {
                if let Some(entry) = self.entries.get(&id) {
                    if let Ok(mut rx) = entry.events.try_lock() {
                        if let Ok(event) = rx.try_recv() {
                            return Ok(Some(event.into_value(id)));
                        }
                    }
                }
            }
            match deadline {
                Some(d) if tokio::time::Instant::now() >= d => return Ok(None),
                _ => tokio::time::sleep(Duration::from_millis(5)).await,
            }
        }
    }

    pub async fn close(&self, handle: HandleId) -> Result<(), NodeError> {
        if self.closed.contains_key(&handle) {
            return Err(Self::closed_error(handle, "event_source_close"));
        }
        match self.entries.remove(&handle) {
            Some((_, entry)) => {
                for task in entry.tasks {
                    task.abort();
                }
                self.closed.insert(handle, ());
                Ok(())
            }
            None => Err(NodeError::Operation(format!("event_source_close: unknown handle {handle}"))),
        }
    }
}

pub(crate) fn host_port(params: &Value, op: &'static str) -> Result<String, NodeError> {
    let Value::Struct(fields) = params else {
        return Err(NodeError::Operation(format!("{op}: params must be a struct")));
    };
    let host = fields.get("host").and_then(Value::as_str).unwrap_or("0.0.0.0");
    let port = fields
        .get("port")
        .and_then(Value::as_int)
        .ok_or_else(|| NodeError::Operation(format!("{op}: params missing integer `port`")))?;
    Ok(format!("{host}:{port}"))
}

pub(crate) fn unix_path(params: &Value, op: &'static str) -> Result<String, NodeError> {
    let Value::Struct(fields) = params else {
        return Err(NodeError::Operation(format!("{op}: params must be a struct")));
    };
    fields
        .get("path")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| NodeError::Operation(format!("{op}: params missing string `path`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closing_an_unknown_handle_is_an_operation_error() {
        let table = HandleTable::new();
        let err = table.close(HandleId::new(99)).await.unwrap_err();
        assert!(matches!(err, NodeError::Operation(_)));
    }

    #[tokio::test]
    async fn polling_an_unknown_handle_is_an_operation_error() {
        let table = HandleTable::new();
        let err = table.poll(&[HandleId::new(1)], Some(10)).await.unwrap_err();
        assert!(matches!(err, NodeError::Operation(_)));
    }

    #[tokio::test]
    async fn poll_times_out_when_nothing_arrives() {
        let table = Arc::new(HandleTable::new());
        let mut fields = BTreeMap::new();
        fields.insert("host".to_string(), Value::String("127.0.0.1".to_string()));
        fields.insert("port".to_string(), Value::Int(0));
        let handle = HandleTable::open(&table, "tcp_listen", &Value::Struct(fields), 8).await.unwrap();
        let result = table.poll(&[handle], Some(20)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn ops_after_close_fail_with_a_closed_error_not_unknown_handle() {
        let table = Arc::new(HandleTable::new());
        let mut fields = BTreeMap::new();
        fields.insert("host".to_string(), Value::String("127.0.0.1".to_string()));
        fields.insert("port".to_string(), Value::Int(0));
        let handle = HandleTable::open(&table, "tcp_listen", &Value::Struct(fields), 8).await.unwrap();

        table.close(handle).await.unwrap();

        let write_err = table.write(handle, b"x", None).await.unwrap_err();
        assert!(write_err.to_string().contains("closed"));

        let poll_err = table.poll(&[handle], Some(5)).await.unwrap_err();
        assert!(poll_err.to_string().contains("closed"));

        let close_err = table.close(handle).await.unwrap_err();
        assert!(close_err.to_string().contains("closed"));
    }
}
