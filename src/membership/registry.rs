use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::types::{NodeId, Peer, PeerDescriptor};

/// The local node's view of the cluster.
///
/// Peers are keyed by node id; the local node itself is held separately and
/// is always part of the view. Mutations bump a version counter so callers
/// can detect that derived state (rings, subscriptions) needs recomputing.
pub struct Registry {
    local_id: NodeId,
    local_request_addr: String,
    local_publish_addr: String,
    peers: DashMap<NodeId, Peer>,
    version: AtomicU64,
}

impl Registry {
    pub fn new(local_id: NodeId, request_addr: String, publish_addr: String) -> Self {
        Self {
            local_id,
            local_request_addr: request_addr,
            local_publish_addr: publish_addr,
            peers: DashMap::new(),
            version: AtomicU64::new(0),
        }
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    pub fn local_request_addr(&self) -> &str {
        &self.local_request_addr
    }

    pub fn local_publish_addr(&self) -> &str {
        &self.local_publish_addr
    }

    /// Upserts a peer by node id and stamps it with the local observation
    /// time. Addresses are overwritten by the latest descriptor, so a node
    /// restarted on a new endpoint replaces its old one.
    ///
    /// Returns true if the peer set changed (a new id appeared). The local
    /// node's own descriptor is ignored.
    pub fn observe(&self, descriptor: &PeerDescriptor) -> bool {
        if descriptor.id == self.local_id {
            return false;
        }
        match self.peers.get_mut(&descriptor.id) {
            Some(mut peer) => {
                if peer.request_addr != descriptor.request_addr
                    || peer.publish_addr != descriptor.publish_addr
                {
                    tracing::info!(
                        "peer {} moved to {} / {}",
                        descriptor.id,
                        descriptor.request_addr,
                        descriptor.publish_addr
                    );
                    peer.request_addr = descriptor.request_addr.clone();
                    peer.publish_addr = descriptor.publish_addr.clone();
                }
                peer.last_seen = Instant::now();
                peer.seen_at = chrono::Utc::now();
                false
            }
            None => {
                tracing::info!(
                    "discovered peer {} at {}",
                    descriptor.id,
                    descriptor.request_addr
                );
                self.peers.insert(
                    descriptor.id.clone(),
                    Peer {
                        id: descriptor.id.clone(),
                        request_addr: descriptor.request_addr.clone(),
                        publish_addr: descriptor.publish_addr.clone(),
                        last_seen: Instant::now(),
                        seen_at: chrono::Utc::now(),
                    },
                );
                self.version.fetch_add(1, Ordering::SeqCst);
                true
            }
        }
    }

    /// Removes every peer (never the local node) unseen for longer than
    /// `max_age` and returns the removed ids.
    pub fn sweep(&self, max_age: Duration) -> Vec<NodeId> {
        let now = Instant::now();
        let expired: Vec<NodeId> = self
            .peers
            .iter()
            .filter(|entry| now.duration_since(entry.value().last_seen) > max_age)
            .map(|entry| entry.key().clone())
            .collect();
        for id in &expired {
            tracing::info!("expiring peer {}", id);
            self.peers.remove(id);
        }
        if !expired.is_empty() {
            self.version.fetch_add(1, Ordering::SeqCst);
        }
        expired
    }

    /// The current view for publication: the local node first, freshly
    /// stamped, followed by all known peers.
    pub fn snapshot(&self) -> Vec<PeerDescriptor> {
        let mut descriptors = vec![PeerDescriptor {
            id: self.local_id.clone(),
            request_addr: self.local_request_addr.clone(),
            publish_addr: self.local_publish_addr.clone(),
            last_seen: chrono::Utc::now(),
        }];
        for entry in self.peers.iter() {
            let peer = entry.value();
            descriptors.push(PeerDescriptor {
                id: peer.id.clone(),
                request_addr: peer.request_addr.clone(),
                publish_addr: peer.publish_addr.clone(),
                last_seen: peer.seen_at,
            });
        }
        descriptors
    }

    pub fn is_known(&self, id: &NodeId) -> bool {
        *id == self.local_id || self.peers.contains_key(id)
    }

    pub fn peer(&self, id: &NodeId) -> Option<Peer> {
        self.peers.get(id).map(|entry| entry.value().clone())
    }

    pub fn peers(&self) -> Vec<Peer> {
        self.peers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// All node ids in the view, the local node included. Input for ring
    /// recomputation.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids = vec![self.local_id.clone()];
        ids.extend(self.peers.iter().map(|entry| entry.key().clone()));
        ids
    }

    /// Bumped whenever the peer set changes.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Number of known nodes, the local one included.
    pub fn node_count(&self) -> usize {
        self.peers.len() + 1
    }
}
