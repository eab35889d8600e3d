//! Cluster Configuration
//!
//! All knobs are read from environment variables with defaults. The hashing
//! parameters (`REPLICAS`, `REDUNDANCY`) and `MAX_SIZE` must be identical on
//! every node of a cluster; a joining node adopts the cluster's hashing
//! parameters from the extended `connect` reply.

use std::env;
use std::time::Duration;

/// Node configuration parameters.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cache budget in characters, counted over concatenated keys and values.
    pub max_size: usize,
    /// Virtual positions per node on each ring (R).
    pub replicas: usize,
    /// Number of independent rings, i.e. the replication factor of a key (D).
    pub redundancy: usize,
    /// Period between membership publications.
    pub publish_interval: Duration,
    /// Age after which an unseen peer is dropped from the registry.
    /// Must stay well above the publish interval so one lost publication
    /// does not evict a healthy peer.
    pub peer_expiry: Duration,
    /// Deadline for a fanned-out API request, and for a single peer request.
    pub request_deadline: Duration,
}

impl Config {
    /// Loads the configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_SIZE` - cache budget in characters (default: 1048576)
    /// - `REPLICAS` - virtual positions per node per ring (default: 128)
    /// - `REDUNDANCY` - independent rings / copies per key (default: 3)
    /// - `PUBLISH_INTERVAL_MS` - membership publish period (default: 5000)
    /// - `PEER_EXPIRY_MS` - peer expiry window (default: 15000)
    /// - `REQUEST_DEADLINE_MS` - API fan-out deadline (default: 5000)
    pub fn from_env() -> Self {
        Self {
            max_size: read_env("MAX_SIZE", 1024 * 1024),
            // A node with no ring positions cannot own anything.
            replicas: read_env("REPLICAS", 128).max(1),
            redundancy: read_env("REDUNDANCY", 3).max(1),
            publish_interval: Duration::from_millis(read_env("PUBLISH_INTERVAL_MS", 5000)),
            peer_expiry: Duration::from_millis(read_env("PEER_EXPIRY_MS", 15000)),
            request_deadline: Duration::from_millis(read_env("REQUEST_DEADLINE_MS", 5000)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_size: 1024 * 1024,
            replicas: 128,
            redundancy: 3,
            publish_interval: Duration::from_millis(5000),
            peer_expiry: Duration::from_millis(15000),
            request_deadline: Duration::from_millis(5000),
        }
    }
}

fn read_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}
