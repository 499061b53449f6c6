//! `udp` source kind — a bound datagram socket. `event_write` requires a
//! `destination` address per call since UDP carries no connection state.

use super::{host_port, Source, SourceEvent, Writer};
use blueprint_kernel::error::NodeError;
use blueprint_kernel::Value;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

pub(crate) async fn open(params: &Value, buffer_size: usize) -> Result<Source, NodeError> {
    let addr = host_port(params, "event_source(udp)")?;
    let socket = UdpSocket::bind(&addr)
        .await
        .map_err(|e| NodeError::Operation(format!("event_source(udp) {addr}: {e}")))?;
    let socket = Arc::new(socket);
    let (tx, rx) = mpsc::channel(buffer_size.max(1));
    let task = tokio::spawn(recv_loop(Arc::clone(&socket), tx));
    Ok(Source { writer: Writer::Udp(socket), events: rx, tasks: vec![task] })
}

async fn recv_loop(socket: Arc<UdpSocket>, tx: mpsc::Sender<SourceEvent>) {
    let mut buf = vec![0u8; 4096];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((n, _peer)) => {
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
