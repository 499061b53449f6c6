//! `tcp_connect` / `tcp_listen` source kinds.

use super::{host_port, HandleTable, Source, SourceEvent, Writer};
use blueprint_kernel::error::NodeError;
use blueprint_kernel::Value;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

pub(crate) async fn connect(params: &Value, buffer_size: usize) -> Result<Source, NodeError> {
    let addr = host_port(params, "event_source(tcp_connect)")?;
    let stream = TcpStream::connect(&addr)
        .await
        .map_err(|e| NodeError::Operation(format!("event_source(tcp_connect) {addr}: {e}")))?;
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    let task = tokio::spawn(read_loop(read_half, tx));
    Ok(Source { writer: Writer::Tcp(tokio::sync::Mutex::new(write_half)), events: rx, tasks: vec![task] })
}

pub(crate) async fn listen(params: &Value, buffer_size: usize, table: Arc<HandleTable>) -> Result<Source, NodeError> {
    let addr = host_port(params, "event_source(tcp_listen)")?;
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| NodeError::Operation(format!("event_source(tcp_listen) {addr}: {e}")))?;
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    let task = tokio::spawn(accept_loop(listener, table, tx, buffer_size));
    Ok(Source { writer: Writer::None, events: rx, tasks: vec![task] })
}

async fn read_loop(mut read_half: OwnedReadHalf, tx: mpsc::Sender<SourceEvent>) {
    let mut buf = vec![0u8; 4096];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                let _ = tx.send(SourceEvent::Closed).await;
                break;
            }
            Ok(n) => {
                if tx.send(SourceEvent::Data(buf[..n].to_vec())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(SourceEvent::Error(e.to_string())).await;
                break;
            }
        }
    }
}

async fn accept_loop(listener: TcpListener, table: Arc<HandleTable>, tx: mpsc::Sender<SourceEvent>, buffer_size: usize) {
    loop {
        match listener.accept().await {
            Ok((stream, _peer)) => {
                let (read_half, write_half) = stream.into_split();
                let (child_tx, child_rx) = mpsc::channel(buffer_size.max(1));
                let read_task = tokio::spawn(read_loop(read_half, child_tx));
                let child_id = table.register_accepted(Writer::Tcp(tokio::sync::Mutex::new(write_half)), child_rx, vec![read_task]);
                if tx.send(SourceEvent::Accept(child_id)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(SourceEvent::Error(e.to_string())).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn listen_then_connect_produces_an_accept_event() {
        let table = Arc::new(HandleTable::new());
        let mut listen_params = BTreeMap::new();
        listen_params.insert("host".to_string(), Value::String("127.0.0.1".to_string()));
        listen_params.insert("port".to_string(), Value::Int(0));

        // Bind to an ephemeral port directly to discover it, then listen
        // on that same address through the table.
        let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = probe.local_addr().unwrap();
        drop(probe);
        listen_params.insert("port".to_string(), Value::Int(addr.port() as i64));

        let listener_handle = HandleTable::open(&table, "tcp_listen", &Value::Struct(listen_params), 8).await.unwrap();

        let mut connect_params = BTreeMap::new();
        connect_params.insert("host".to_string(), Value::String("127.0.0.1".to_string()));
        connect_params.insert("port".to_string(), Value::Int(addr.port() as i64));
        let _client_handle = HandleTable::open(&table, "tcp_connect", &Value::Struct(connect_params), 8).await.unwrap();

        let event = table.poll(&[listener_handle], Some(2000)).await.unwrap();
        let Some(Value::Struct(fields)) = event else { panic!("expected an accept event") };
        assert_eq!(fields.get("type"), Some(&Value::String("accept".to_string())));
    }
}
