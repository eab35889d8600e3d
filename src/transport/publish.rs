use anyhow::Result;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::codec::{self, FrameWriter};
use crate::protocol::envelope::Frames;

/// The broadcasting end of the publish protocol.
///
/// Subscribers connect to the bound endpoint and receive every published
/// message. Delivery is best-effort: a subscriber that is gone or cannot
/// keep up is silently dropped, matching the lossy publish contract.
pub struct Publisher {
    local_addr: SocketAddr,
    subscribers: Arc<DashMap<u64, mpsc::Sender<Frames>>>,
    accept_task: JoinHandle<()>,
}

impl Publisher {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let subscribers: Arc<DashMap<u64, mpsc::Sender<Frames>>> = Arc::new(DashMap::new());
        let accept_task = tokio::spawn(accept_loop(listener, subscribers.clone()));
        Ok(Self {
            local_addr,
            subscribers,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn publish(&self, frames: &Frames) {
        let mut gone = Vec::new();
        for entry in self.subscribers.iter() {
            if entry.value().try_send(frames.clone()).is_err() {
                gone.push(*entry.key());
            }
        }
        for id in gone {
            tracing::debug!("dropping subscriber {}", id);
            self.subscribers.remove(&id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn accept_loop(listener: TcpListener, subscribers: Arc<DashMap<u64, mpsc::Sender<Frames>>>) {
    // Fan-out tasks live in a JoinSet so they die with the publisher.
    let mut connections = tokio::task::JoinSet::new();
    let mut next_id: u64 = 0;
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                tracing::debug!("accepted subscriber {}", remote);
                while connections.try_join_next().is_some() {}
                let (_reader, writer) = codec::split(stream);
                let (tx, rx) = mpsc::channel(16);
                let id = next_id;
                next_id += 1;
                subscribers.insert(id, tx);
                let subscribers = subscribers.clone();
                connections.spawn(async move {
                    write_loop(writer, rx).await;
                    subscribers.remove(&id);
                });
            }
            Err(e) => {
                tracing::warn!("accept failed: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn write_loop(mut writer: FrameWriter, mut rx: mpsc::Receiver<Frames>) {
    while let Some(frames) = rx.recv().await {
        if let Err(e) = codec::write_frames(&mut writer, &frames).await {
            tracing::debug!("failed to publish to subscriber: {}", e);
            return;
        }
    }
}

/// The receiving end: one connection to one peer's publish endpoint,
/// forwarding every publication into a shared channel.
pub struct Subscriber {
    addr: String,
    read_task: JoinHandle<()>,
}

impl Subscriber {
    pub async fn connect(addr: &str, tx: mpsc::Sender<Frames>) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = codec::split(stream);
        let read_task = tokio::spawn(read_loop(reader, writer, tx, addr.to_string()));
        Ok(Self {
            addr: addr.to_string(),
            read_task,
        })
    }

    /// The publish address this subscription was created for; compared by
    /// the reconciler to notice peers that moved.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.read_task.abort();
    }
}

async fn read_loop(
    mut reader: super::codec::FrameReader,
    _writer: FrameWriter,
    tx: mpsc::Sender<Frames>,
    addr: String,
) {
    while let Some(message) = codec::read_frames(&mut reader).await {
        match message {
            Ok(frames) => {
                if tx.send(frames).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::debug!("subscription to {} failed: {}", addr, e);
                return;
            }
        }
    }
    tracing::debug!("publisher {} closed", addr);
}
