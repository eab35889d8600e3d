use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Instant;

/// Unique identifier for a node in the cluster.
/// Wrapper around a UUID string to ensure global uniqueness across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    /// Generates a new random UUID v4-based NodeId.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A peer as stored in the local registry.
///
/// `last_seen` is the local observation time, used only by the expiry
/// sweeper; `seen_at` is the wall-clock equivalent carried in publications.
#[derive(Debug, Clone)]
pub struct Peer {
    pub id: NodeId,
    /// Endpoint serving the peer request protocol.
    pub request_addr: String,
    /// Endpoint the peer publishes its registry on.
    pub publish_addr: String,
    pub last_seen: Instant,
    pub seen_at: DateTime<Utc>,
}

/// A node descriptor as carried on the wire (publications and `connect`).
#[derive(Debug, Clone, PartialEq)]
pub struct PeerDescriptor {
    pub id: NodeId,
    pub request_addr: String,
    pub publish_addr: String,
    /// The sender's last-seen stamp. Informational: a merge records its own
    /// observation time instead of trusting the sender's clock.
    pub last_seen: DateTime<Utc>,
}
