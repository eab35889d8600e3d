//! Cluster integration tests.
//!
//! Each test boots real nodes on ephemeral loopback ports and drives them
//! through the client API, the way an external client would.

use std::sync::Arc;
use std::time::Duration;

use distributed_cache::client::ApiClient;
use distributed_cache::config::Config;
use distributed_cache::node::server::Node;
use distributed_cache::protocol::api::ApiCode;
use distributed_cache::ring::index::RingIndex;

fn test_config() -> Config {
    Config {
        max_size: 1024,
        replicas: 128,
        redundancy: 3,
        publish_interval: Duration::from_millis(200),
        peer_expiry: Duration::from_millis(600),
        request_deadline: Duration::from_millis(800),
    }
}

async fn start_node(config: Config, join: Option<&str>) -> Arc<Node> {
    Node::start(config, "127.0.0.1:0", "127.0.0.1:0", "127.0.0.1:0", join)
        .await
        .expect("failed to start node")
}

async fn client_for(node: &Node) -> ApiClient {
    ApiClient::connect(&node.api_addr().to_string(), Duration::from_secs(5))
        .await
        .expect("failed to connect client")
}

async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = tokio::time::Instant::now();
    while start.elapsed() < limit {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    condition()
}

#[tokio::test]
async fn test_single_node_set_and_get() {
    let node = start_node(test_config(), None).await;
    let client = client_for(&node).await;

    assert_eq!(client.set("alpha", "one").await.unwrap(), ApiCode::NoError);
    assert_eq!(client.get("alpha").await.unwrap(), Some("one".to_string()));
}

#[tokio::test]
async fn test_delete_via_empty_value() {
    let node = start_node(test_config(), None).await;
    let client = client_for(&node).await;

    assert_eq!(client.set("alpha", "one").await.unwrap(), ApiCode::NoError);
    assert_eq!(client.set("alpha", "").await.unwrap(), ApiCode::NoError);
    assert_eq!(client.get("alpha").await.unwrap(), None);
}

#[tokio::test]
async fn test_too_big_entry_is_rejected() {
    let config = Config {
        max_size: 8,
        ..test_config()
    };
    let node = start_node(config, None).await;
    let client = client_for(&node).await;

    assert_eq!(
        client.set("key", "toolong!!").await.unwrap(),
        ApiCode::TooBig
    );
    assert_eq!(client.get("key").await.unwrap(), None);
}

#[tokio::test]
async fn test_unknown_node_id_miss_is_empty() {
    let node = start_node(test_config(), None).await;
    let client = client_for(&node).await;

    assert_eq!(client.get("never-written").await.unwrap(), None);
}

#[tokio::test]
async fn test_join_handshake_builds_mutual_view() {
    let a = start_node(test_config(), None).await;
    let b = start_node(test_config(), Some(&a.request_addr().to_string())).await;

    // The connect handshake makes the views mutual right away.
    assert!(b.known_nodes().contains(&a.node_id()));
    assert!(a.known_nodes().contains(&b.node_id()));

    // The same view is visible through the API.
    let client = client_for(&a).await;
    let status = client.status().await.unwrap();
    assert_eq!(status.node_id, a.node_id().to_string());
    assert_eq!(status.other_ids, vec![b.node_id().to_string()]);
}

#[tokio::test]
async fn test_publications_spread_membership() {
    let a = start_node(test_config(), None).await;
    let b = start_node(test_config(), Some(&a.request_addr().to_string())).await;
    // C only ever talks to B; it must learn about A through publications.
    let c = start_node(test_config(), Some(&b.request_addr().to_string())).await;

    let converged = wait_until(Duration::from_secs(3), || {
        a.known_nodes().contains(&c.node_id()) && c.known_nodes().contains(&a.node_id())
    })
    .await;

    assert!(converged, "three-node view did not converge");
}

#[tokio::test]
async fn test_joiner_adopts_cluster_hash_parameters() {
    let a = start_node(test_config(), None).await;
    let mismatched = Config {
        replicas: 16,
        redundancy: 1,
        ..test_config()
    };
    let b = start_node(mismatched, Some(&a.request_addr().to_string())).await;

    // A write through B must still reach every owner A computes, which
    // only holds once B routes with the cluster's parameters.
    let client_a = client_for(&a).await;
    let client_b = client_for(&b).await;
    assert_eq!(client_b.set("shared", "value").await.unwrap(), ApiCode::NoError);
    assert_eq!(
        client_a.get("shared").await.unwrap(),
        Some("value".to_string())
    );
}

#[tokio::test]
async fn test_replicated_set_is_readable_on_both_nodes() {
    let config = Config {
        redundancy: 2,
        ..test_config()
    };
    let a = start_node(config.clone(), None).await;
    let b = start_node(config.clone(), Some(&a.request_addr().to_string())).await;

    // Recompute the two-node rings to pick a key both nodes own.
    let index = RingIndex::new(config.replicas, config.redundancy);
    index.rebuild(&[a.node_id(), b.node_id()]);
    let key = (0..10_000)
        .map(|i| format!("key_{}", i))
        .find(|key| index.owners(key).len() == 2)
        .expect("no key with two owners");

    let client_a = client_for(&a).await;
    let client_b = client_for(&b).await;

    assert_eq!(client_a.set(&key, "replicated").await.unwrap(), ApiCode::NoError);
    assert_eq!(
        client_b.get(&key).await.unwrap(),
        Some("replicated".to_string())
    );
    assert_eq!(
        client_a.get(&key).await.unwrap(),
        Some("replicated".to_string())
    );

    // Both local stores hold a copy.
    let status_a = client_a.status().await.unwrap();
    let status_b = client_b.status().await.unwrap();
    assert_eq!(status_a.keys, 1);
    assert_eq!(status_b.keys, 1);
}

#[tokio::test]
async fn test_dead_owner_turns_set_into_timeout() {
    // A long expiry keeps the dead node in the ring for the write.
    let config = Config {
        redundancy: 2,
        peer_expiry: Duration::from_secs(30),
        ..test_config()
    };
    let a = start_node(config.clone(), None).await;
    let b = start_node(config.clone(), Some(&a.request_addr().to_string())).await;

    let index = RingIndex::new(config.replicas, config.redundancy);
    index.rebuild(&[a.node_id(), b.node_id()]);
    let key = (0..10_000)
        .map(|i| format!("key_{}", i))
        .find(|key| index.owners(key).len() == 2)
        .expect("no key with two owners");

    b.shutdown();

    let client = client_for(&a).await;
    assert_eq!(client.set(&key, "partial").await.unwrap(), ApiCode::Timeout);

    // The write still landed on the reachable owner.
    assert_eq!(client.get(&key).await.unwrap(), Some("partial".to_string()));
}

#[tokio::test]
async fn test_silent_peer_is_expired() {
    let a = start_node(test_config(), None).await;
    let b = start_node(test_config(), Some(&a.request_addr().to_string())).await;
    assert!(a.known_nodes().contains(&b.node_id()));

    b.shutdown();

    let expired = wait_until(Duration::from_secs(3), || {
        !a.known_nodes().contains(&b.node_id())
    })
    .await;

    assert!(expired, "dead peer was never expired");
    assert_eq!(a.known_nodes(), vec![a.node_id()]);
}

#[tokio::test]
async fn test_duplicate_node_id_is_rejected_on_join() {
    let a = start_node(test_config(), None).await;
    let b = start_node(test_config(), Some(&a.request_addr().to_string())).await;

    // A third process trying to join under B's id must be turned away.
    use distributed_cache::protocol::peer::{self, PeerCode};
    use distributed_cache::transport::peer::PeerConnection;

    let connection = PeerConnection::connect(&a.request_addr().to_string())
        .await
        .unwrap();
    let reply = connection
        .request(
            peer::build_connect(&b.node_id(), "127.0.0.1:1", "127.0.0.1:2"),
            Duration::from_secs(2),
        )
        .await
        .unwrap();
    let (code, _) = peer::parse_reply(&reply).unwrap();

    assert_eq!(code, PeerCode::NodeIdTaken);
}

#[tokio::test]
async fn test_writes_survive_on_any_contacted_node() {
    // Whichever node a client talks to, reads see earlier writes.
    let a = start_node(test_config(), None).await;
    let b = start_node(test_config(), Some(&a.request_addr().to_string())).await;

    let client_a = client_for(&a).await;
    let client_b = client_for(&b).await;

    for i in 0..20 {
        let key = format!("key_{}", i);
        assert_eq!(
            client_a.set(&key, "payload").await.unwrap(),
            ApiCode::NoError
        );
    }
    for i in 0..20 {
        let key = format!("key_{}", i);
        assert_eq!(
            client_b.get(&key).await.unwrap(),
            Some("payload".to_string()),
            "key {} not readable via the other node",
            key
        );
    }
}
