use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::codec::{self, FrameReader, FrameWriter};
use crate::protocol::envelope::{self, Frames};

/// An inbound request, already split into envelope and payload, together
/// with a handle answering on the connection it arrived from.
pub struct InboundRequest {
    pub envelope: Frames,
    pub payload: Frames,
    pub reply: ReplySender,
}

/// Routes a reply back to the requester's connection.
#[derive(Clone)]
pub struct ReplySender {
    tx: mpsc::Sender<Frames>,
}

impl ReplySender {
    pub async fn send(&self, frames: Frames) {
        if self.tx.send(frames).await.is_err() {
            tracing::debug!("requester disconnected before the reply");
        }
    }
}

/// Serves one bound endpoint (peer request or API) and funnels every inbound
/// request into a single queue for the dispatcher.
pub struct RequestListener {
    local_addr: SocketAddr,
    rx: mpsc::Receiver<InboundRequest>,
    accept_task: JoinHandle<()>,
}

impl RequestListener {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let (tx, rx) = mpsc::channel(64);
        let accept_task = tokio::spawn(accept_loop(listener, tx));
        Ok(Self {
            local_addr,
            rx,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn next(&mut self) -> Option<InboundRequest> {
        self.rx.recv().await
    }
}

impl Drop for RequestListener {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(listener: TcpListener, tx: mpsc::Sender<InboundRequest>) {
    // Connection tasks live in a JoinSet so they die with the listener.
    let mut connections = tokio::task::JoinSet::new();
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                tracing::debug!("accepted requester {}", remote);
                while connections.try_join_next().is_some() {}
                let (reader, writer) = codec::split(stream);
                let (reply_tx, reply_rx) = mpsc::channel(64);
                connections.spawn(write_loop(writer, reply_rx));
                connections.spawn(read_loop(reader, tx.clone(), ReplySender { tx: reply_tx }));
            }
            Err(e) => {
                tracing::warn!("accept failed: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn read_loop(mut reader: FrameReader, tx: mpsc::Sender<InboundRequest>, reply: ReplySender) {
    while let Some(message) = codec::read_frames(&mut reader).await {
        match message {
            Ok(frames) => match envelope::split(frames) {
                Some((envelope, payload)) => {
                    let request = InboundRequest {
                        envelope,
                        payload,
                        reply: reply.clone(),
                    };
                    if tx.send(request).await.is_err() {
                        return; // listener gone
                    }
                }
                // Without an envelope there is nowhere to send an answer.
                None => tracing::warn!("request without envelope delimiter, dropped"),
            },
            Err(e) => {
                tracing::warn!("failed to read request: {}", e);
                return;
            }
        }
    }
}

async fn write_loop(mut writer: FrameWriter, mut rx: mpsc::Receiver<Frames>) {
    while let Some(frames) = rx.recv().await {
        if let Err(e) = codec::write_frames(&mut writer, &frames).await {
            tracing::debug!("failed to write reply: {}", e);
            return;
        }
    }
}
