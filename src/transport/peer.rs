use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::codec::{self, FrameReader, FrameWriter};
use crate::protocol::envelope::{self, Frames};

/// The requester side of the peer request protocol.
///
/// Every request carries a fresh envelope id; the read loop matches reply
/// envelopes against pending requests. A reply arriving after its request's
/// deadline finds no pending entry anymore and is dropped.
pub struct PeerConnection {
    addr: String,
    tx: mpsc::Sender<Frames>,
    pending: Arc<DashMap<Vec<u8>, oneshot::Sender<Frames>>>,
    closed: Arc<AtomicBool>,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl PeerConnection {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = codec::split(stream);
        let (tx, rx) = mpsc::channel(64);
        let pending: Arc<DashMap<Vec<u8>, oneshot::Sender<Frames>>> = Arc::new(DashMap::new());
        let closed = Arc::new(AtomicBool::new(false));
        let write_task = tokio::spawn(write_loop(writer, rx, closed.clone()));
        let read_task = tokio::spawn(read_loop(
            reader,
            pending.clone(),
            closed.clone(),
            addr.to_string(),
        ));
        Ok(Self {
            addr: addr.to_string(),
            tx,
            pending,
            closed,
            read_task,
            write_task,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// The read loop saw the connection go away; callers should reconnect.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends a request payload and awaits the matching reply payload.
    pub async fn request(&self, payload: Frames, deadline: Duration) -> Result<Frames> {
        let id = uuid::Uuid::new_v4().as_bytes().to_vec();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(id.clone(), reply_tx);

        let frames = envelope::request(&id, payload);
        if self.tx.send(frames).await.is_err() {
            self.pending.remove(&id);
            anyhow::bail!("connection to {} closed", self.addr);
        }

        match tokio::time::timeout(deadline, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                self.pending.remove(&id);
                anyhow::bail!("connection to {} lost", self.addr)
            }
            Err(_) => {
                self.pending.remove(&id);
                anyhow::bail!("request to {} exceeded its deadline", self.addr)
            }
        }
    }
}

impl Drop for PeerConnection {
    fn drop(&mut self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

async fn read_loop(
    mut reader: FrameReader,
    pending: Arc<DashMap<Vec<u8>, oneshot::Sender<Frames>>>,
    closed: Arc<AtomicBool>,
    addr: String,
) {
    while let Some(message) = codec::read_frames(&mut reader).await {
        match message {
            Ok(frames) => {
                let Some((envelope, payload)) = envelope::split(frames) else {
                    tracing::warn!("reply from {} without envelope, dropped", addr);
                    continue;
                };
                let Some(id) = envelope.first().filter(|frame| !frame.is_empty()) else {
                    tracing::warn!("reply from {} without request id, dropped", addr);
                    continue;
                };
                match pending.remove(id) {
                    Some((_, reply_tx)) => {
                        let _ = reply_tx.send(payload);
                    }
                    None => tracing::debug!("late reply from {}, dropped", addr),
                }
            }
            Err(e) => {
                tracing::warn!("failed to read reply from {}: {}", addr, e);
                break;
            }
        }
    }
    closed.store(true, Ordering::SeqCst);
}

async fn write_loop(
    mut writer: FrameWriter,
    mut rx: mpsc::Receiver<Frames>,
    closed: Arc<AtomicBool>,
) {
    while let Some(frames) = rx.recv().await {
        if let Err(e) = codec::write_frames(&mut writer, &frames).await {
            tracing::debug!("failed to write request: {}", e);
            break;
        }
    }
    closed.store(true, Ordering::SeqCst);
}
