//! `unix_connect` / `unix_listen` source kinds — the same read/accept loop
//! shape as [`super::tcp`], over `UnixStream`/`UnixListener` instead.

use super::{unix_path, HandleTable, Source, SourceEvent, Writer};
use blueprint_kernel::error::NodeError;
use blueprint_kernel::Value;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::unix::OwnedReadHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;

pub(crate) async fn connect(params: &Value, buffer_size: usize) -> Result<Source, NodeError> {
    let path = unix_path(params, "event_source(unix_connect)")?;
    let stream = UnixStream::connect(&path)
        .await
        .map_err(|e| NodeError::Operation(format!("event_source(unix_connect) {path}: {e}")))?;
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    let task = tokio::spawn(read_loop(read_half, tx));
    Ok(Source { writer: Writer::Unix(tokio::sync::Mutex::new(write_half)), events: rx, tasks: vec![task] })
}

pub(crate) async fn listen(params: &Value, buffer_size: usize, table: Arc<HandleTable>) -> Result<Source, NodeError> {
    let path = unix_path(params, "event_source(unix_listen)")?;
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .map_err(|e| NodeError::Operation(format!("event_source(unix_listen) {path}: {e}")))?;
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

async fn accept_loop(listener: UnixListener, table: Arc<HandleTable>, tx: mpsc::Sender<SourceEvent>, buffer_size: usize) {
    loop {
        match listener.accept().await {
            Ok((stream, _peer)) => {
                let (read_half, write_half) = stream.into_split();
                let (child_tx, child_rx) = mpsc::channel(buffer_size.max(1));
                let read_task = tokio::spawn(read_loop(read_half, child_tx));
                let child_id = table.register_accepted(Writer::Unix(tokio::sync::Mutex::new(write_half)), child_rx, vec![read_task]);
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
