//! Node assembly and background loops.

use anyhow::Result;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{api_router, peer_handler};
use crate::cache::store::CacheStore;
use crate::config::Config;
use crate::membership::registry::Registry;
use crate::membership::types::{NodeId, PeerDescriptor};
use crate::protocol::envelope::Frames;
use crate::protocol::peer::{self, PeerCode};
use crate::protocol::publish;
use crate::ring::index::RingIndex;
use crate::transport::peer::PeerConnection;
use crate::transport::publish::{Publisher, Subscriber};
use crate::transport::request::RequestListener;

/// State shared by the request handlers and the background loops.
pub struct Shared {
    pub config: Config,
    pub registry: Registry,
    pub ring: RingIndex,
    pub cache: CacheStore,
    /// Live requester connections to peers, rebuilt on demand.
    connections: DashMap<NodeId, Arc<PeerConnection>>,
}

impl Shared {
    /// Regenerates the rings from the current membership view.
    pub fn rebuild_ring(&self) {
        self.ring.rebuild(&self.registry.node_ids());
    }

    /// The requester connection to a peer, reconnecting if the cached one
    /// died. `None` when the peer is unknown or unreachable; callers treat
    /// that as a missing reply.
    pub async fn connection(&self, id: &NodeId) -> Option<Arc<PeerConnection>> {
        {
            if let Some(existing) = self.connections.get(id)
                && !existing.is_closed()
            {
                return Some(existing.value().clone());
            }
        }
        self.connections.remove(id);
        let peer = self.registry.peer(id)?;
        match PeerConnection::connect(&peer.request_addr).await {
            Ok(connection) => {
                let connection = Arc::new(connection);
                self.connections.insert(id.clone(), connection.clone());
                Some(connection)
            }
            Err(e) => {
                tracing::debug!("cannot reach {} at {}: {}", id, peer.request_addr, e);
                None
            }
        }
    }

    fn drop_connection(&self, id: &NodeId) {
        self.connections.remove(id);
    }
}

/// A running cache node: three bound endpoints plus the background loops.
pub struct Node {
    shared: Arc<Shared>,
    request_addr: SocketAddr,
    publish_addr: SocketAddr,
    api_addr: SocketAddr,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Node {
    /// Binds the three endpoints, optionally joins an existing cluster via
    /// one peer's request address, and spawns all serving loops.
    pub async fn start(
        config: Config,
        request_addr: &str,
        publish_addr: &str,
        api_addr: &str,
        join_addr: Option<&str>,
    ) -> Result<Arc<Self>> {
        let request_listener = RequestListener::bind(request_addr).await?;
        let publisher = Publisher::bind(publish_addr).await?;
        let api_listener = RequestListener::bind(api_addr).await?;

        let registry = Registry::new(
            NodeId::new(),
            request_listener.local_addr().to_string(),
            publisher.local_addr().to_string(),
        );
        tracing::info!("node id: {}", registry.local_id());

        let shared = Arc::new(Shared {
            ring: RingIndex::new(config.replicas, config.redundancy),
            cache: CacheStore::new(config.max_size),
            connections: DashMap::new(),
            registry,
            config,
        });
        shared.rebuild_ring();

        if let Some(join_addr) = join_addr {
            join_cluster(&shared, join_addr).await?;
        }

        let node = Arc::new(Self {
            shared: shared.clone(),
            request_addr: request_listener.local_addr(),
            publish_addr: publisher.local_addr(),
            api_addr: api_listener.local_addr(),
            tasks: Mutex::new(Vec::new()),
        });

        let (merge_tx, merge_rx) = mpsc::channel(64);
        let tasks = vec![
            tokio::spawn(publish_loop(shared.clone(), publisher)),
            tokio::spawn(subscription_loop(shared.clone(), merge_tx)),
            tokio::spawn(merge_loop(shared.clone(), merge_rx)),
            tokio::spawn(sweep_loop(shared.clone())),
            tokio::spawn(peer_dispatch_loop(shared.clone(), request_listener)),
            tokio::spawn(api_dispatch_loop(shared.clone(), api_listener)),
        ];
        *node.tasks.lock().expect("task list poisoned") = tasks;

        Ok(node)
    }

    pub fn node_id(&self) -> NodeId {
        self.shared.registry.local_id().clone()
    }

    pub fn request_addr(&self) -> SocketAddr {
        self.request_addr
    }

    pub fn publish_addr(&self) -> SocketAddr {
        self.publish_addr
    }

    pub fn api_addr(&self) -> SocketAddr {
        self.api_addr
    }

    /// All node ids currently known, the local one included.
    pub fn known_nodes(&self) -> Vec<NodeId> {
        self.shared.registry.node_ids()
    }

    /// Stops every loop and closes all endpoints. In-flight requests are
    /// abandoned; peers will notice through their own deadlines and expiry.
    pub fn shutdown(&self) {
        tracing::info!("shutting down node {}", self.shared.registry.local_id());
        for task in self.tasks.lock().expect("task list poisoned").drain(..) {
            task.abort();
        }
        self.shared.connections.clear();
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The join handshake: announce ourselves to one existing peer and record
/// the responder. Fails fast when our node id is already taken.
async fn join_cluster(shared: &Arc<Shared>, join_addr: &str) -> Result<()> {
    tracing::info!("joining cluster via {}", join_addr);
    let connection = Arc::new(PeerConnection::connect(join_addr).await?);
    let payload = peer::build_connect(
        shared.registry.local_id(),
        shared.registry.local_request_addr(),
        shared.registry.local_publish_addr(),
    );
    let reply = connection
        .request(payload, shared.config.request_deadline)
        .await?;
    let (code, rest) =
        peer::parse_reply(&reply).ok_or_else(|| anyhow::anyhow!("malformed connect reply"))?;
    match code {
        PeerCode::NoError => {}
        PeerCode::NodeIdTaken => anyhow::bail!("node id is already taken in the cluster"),
        other => anyhow::bail!("connect rejected: {:?}", other),
    }

    let [id, request_addr, publish_addr, params @ ..] = rest else {
        anyhow::bail!("connect reply is missing the responder descriptor");
    };
    let descriptor = PeerDescriptor {
        id: NodeId(std::str::from_utf8(id)?.to_string()),
        request_addr: std::str::from_utf8(request_addr)?.to_string(),
        publish_addr: std::str::from_utf8(publish_addr)?.to_string(),
        last_seen: Utc::now(),
    };

    // A cluster that advertises its hashing parameters wins over the local
    // configuration; routing with mismatched parameters would silently miss
    // replicas.
    if let [replicas, redundancy] = params {
        let replicas: usize = std::str::from_utf8(replicas)?.parse()?;
        let redundancy: usize = std::str::from_utf8(redundancy)?.parse()?;
        if (replicas, redundancy) != shared.ring.params() {
            tracing::warn!(
                "adopting cluster hashing parameters R={} D={}",
                replicas,
                redundancy
            );
            shared
                .ring
                .adopt_params(replicas, redundancy, &shared.registry.node_ids());
        }
    }

    shared.registry.observe(&descriptor);
    shared.rebuild_ring();
    shared
        .connections
        .insert(descriptor.id.clone(), connection);
    tracing::info!("joined cluster via node {}", descriptor.id);
    Ok(())
}

/// Periodically broadcasts the registry snapshot on the publish endpoint.
async fn publish_loop(shared: Arc<Shared>, publisher: Publisher) {
    let mut interval = tokio::time::interval(shared.config.publish_interval);
    loop {
        interval.tick().await;
        let snapshot = shared.registry.snapshot();
        tracing::debug!(
            "publishing {} descriptor(s) to {} subscriber(s)",
            snapshot.len(),
            publisher.subscriber_count()
        );
        publisher.publish(&publish::build(&snapshot));
    }
}

/// Keeps one subscription per known peer, keyed by its publish address.
/// The subscription set is derived from the registry: peers that appear get
/// subscribed, peers that vanish (or move) get dropped.
async fn subscription_loop(shared: Arc<Shared>, merge_tx: mpsc::Sender<Frames>) {
    let mut subscriptions: HashMap<NodeId, Subscriber> = HashMap::new();
    let mut interval = tokio::time::interval(shared.config.publish_interval / 2);
    loop {
        interval.tick().await;
        let desired: HashMap<NodeId, String> = shared
            .registry
            .peers()
            .into_iter()
            .map(|peer| (peer.id, peer.publish_addr))
            .collect();

        subscriptions.retain(|id, subscription| {
            desired.get(id).is_some_and(|addr| addr == subscription.addr())
        });

        for (id, addr) in desired {
            if subscriptions.contains_key(&id) {
                continue;
            }
            match Subscriber::connect(&addr, merge_tx.clone()).await {
                Ok(subscription) => {
                    tracing::debug!("subscribed to {} at {}", id, addr);
                    subscriptions.insert(id, subscription);
                }
                Err(e) => tracing::debug!("subscription to {} failed: {}", addr, e),
            }
        }
    }
}

/// Merges inbound publications into the registry.
async fn merge_loop(shared: Arc<Shared>, mut merge_rx: mpsc::Receiver<Frames>) {
    while let Some(frames) = merge_rx.recv().await {
        let Some(descriptors) = publish::parse(&frames) else {
            tracing::debug!("publication with foreign topic, ignored");
            continue;
        };
        let mut changed = false;
        for descriptor in &descriptors {
            changed |= shared.registry.observe(descriptor);
        }
        if changed {
            shared.rebuild_ring();
        }
    }
}

/// Expires peers that have stayed silent past the expiry window.
async fn sweep_loop(shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(shared.config.publish_interval);
    loop {
        interval.tick().await;
        let removed = shared.registry.sweep(shared.config.peer_expiry);
        if removed.is_empty() {
            continue;
        }
        for id in &removed {
            shared.drop_connection(id);
        }
        shared.rebuild_ring();
        tracing::info!(
            "{} peer(s) expired, {} node(s) remain",
            removed.len(),
            shared.registry.node_count()
        );
    }
}

/// Serves the peer request endpoint in arrival order.
async fn peer_dispatch_loop(shared: Arc<Shared>, mut listener: RequestListener) {
    while let Some(request) = listener.next().await {
        peer_handler::handle(&shared, request).await;
    }
}

/// Serves the API endpoint. Requests run concurrently because each one may
/// wait on remote owners for up to the deadline.
async fn api_dispatch_loop(shared: Arc<Shared>, mut listener: RequestListener) {
    let mut requests = tokio::task::JoinSet::new();
    while let Some(request) = listener.next().await {
        while requests.try_join_next().is_some() {}
        let shared = shared.clone();
        requests.spawn(async move {
            api_router::handle(&shared, request).await;
        });
    }
}
