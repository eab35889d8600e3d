use siphasher::sip::SipHasher13;
use std::hash::Hasher;
use std::sync::RwLock;

use crate::membership::types::NodeId;

/// Position on a ring.
///
/// The full 64-bit hash is kept instead of mapping it onto [0, 1): dividing
/// by 2^64 is monotone, so ordering and therefore ownership are unchanged,
/// while comparisons stay exact.
fn position_of(data: &str) -> u64 {
    let mut hasher = SipHasher13::new();
    hasher.write(data.as_bytes());
    hasher.finish()
}

/// One virtual position: (position, node).
type RingEntry = (u64, NodeId);

struct Rings {
    replicas: usize,
    redundancy: usize,
    /// One sorted array per ring.
    rings: Vec<Vec<RingEntry>>,
}

/// The key-to-owners index derived from the membership view.
pub struct RingIndex {
    inner: RwLock<Rings>,
}

impl RingIndex {
    pub fn new(replicas: usize, redundancy: usize) -> Self {
        Self {
            inner: RwLock::new(Rings {
                replicas: replicas.max(1),
                redundancy: redundancy.max(1),
                rings: Vec::new(),
            }),
        }
    }

    /// (REPLICAS, REDUNDANCY) currently in effect.
    pub fn params(&self) -> (usize, usize) {
        let inner = self.inner.read().expect("ring lock poisoned");
        (inner.replicas, inner.redundancy)
    }

    /// Adopts the cluster's hashing parameters (from the extended `connect`
    /// reply) and rebuilds with the given nodes.
    pub fn adopt_params(&self, replicas: usize, redundancy: usize, nodes: &[NodeId]) {
        {
            let mut inner = self.inner.write().expect("ring lock poisoned");
            inner.replicas = replicas.max(1);
            inner.redundancy = redundancy.max(1);
        }
        self.rebuild(nodes);
    }

    /// Regenerates all rings from the given node set.
    ///
    /// Deterministic: the output depends only on the set of ids and the
    /// hashing parameters, never on insertion order. Position collisions are
    /// broken by (replica, node id) so every node sorts identically.
    pub fn rebuild(&self, nodes: &[NodeId]) {
        let mut inner = self.inner.write().expect("ring lock poisoned");
        let (replicas, redundancy) = (inner.replicas, inner.redundancy);

        let mut rings = Vec::with_capacity(redundancy);
        for ring in 0..redundancy {
            let mut entries: Vec<(u64, usize, &NodeId)> = Vec::with_capacity(nodes.len() * replicas);
            for node in nodes {
                for replica in 0..replicas {
                    let position = position_of(&format!("{}:{}:{}", node.as_str(), ring, replica));
                    entries.push((position, replica, node));
                }
            }
            entries.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
            rings.push(
                entries
                    .into_iter()
                    .map(|(position, _, node)| (position, node.clone()))
                    .collect(),
            );
        }
        inner.rings = rings;
    }

    /// The owners of `key`, one per ring, deduplicated while preserving
    /// first-seen (ring) order. Empty only if the index was never rebuilt.
    pub fn owners(&self, key: &str) -> Vec<NodeId> {
        let key_position = position_of(key);
        let inner = self.inner.read().expect("ring lock poisoned");

        let mut owners: Vec<NodeId> = Vec::with_capacity(inner.redundancy);
        for ring in &inner.rings {
            if ring.is_empty() {
                continue;
            }
            // First entry at or past the key, wrapping to the start of the
            // ring when the key hashes beyond the last position.
            let index = ring.partition_point(|entry| entry.0 < key_position);
            let owner = if index == ring.len() {
                &ring[0].1
            } else {
                &ring[index].1
            };
            if !owners.contains(owner) {
                owners.push(owner.clone());
            }
        }
        owners
    }
}
