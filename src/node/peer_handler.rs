//! Inbound peer request handling.

use chrono::Utc;

use super::server::Shared;
use crate::cache::store::StoreError;
use crate::membership::types::PeerDescriptor;
use crate::protocol::envelope::{self, Frames};
use crate::protocol::peer::{PeerCode, PeerRequest};
use crate::protocol::{peer, timestamp};
use crate::transport::request::InboundRequest;

/// Serves one message from the request endpoint and replies on the
/// connection it arrived from, envelope first.
pub async fn handle(shared: &Shared, request: InboundRequest) {
    let payload = match peer::parse(&request.payload) {
        Ok(parsed) => dispatch(shared, parsed),
        Err(code) => {
            tracing::debug!("rejecting peer request: {:?}", code);
            vec![code.as_frame()]
        }
    };
    let reply = envelope::reply(&request.envelope, payload);
    request.reply.send(reply).await;
}

fn dispatch(shared: &Shared, request: PeerRequest) -> Frames {
    match request {
        PeerRequest::Set {
            key,
            value,
            timestamp,
        } => match shared.cache.put(&key, &value, timestamp) {
            Ok(()) => vec![PeerCode::NoError.as_frame()],
            Err(StoreError::TooBig { .. }) => vec![PeerCode::TooBig.as_frame()],
        },
        PeerRequest::Get { key } => match shared.cache.get(&key) {
            Some(entry) => vec![
                PeerCode::NoError.as_frame(),
                entry.value.into_bytes(),
                timestamp::render(entry.timestamp).into_bytes(),
            ],
            // A miss is an empty value with timestamp zero; the router on
            // the other side tells them apart by the value frame.
            None => vec![PeerCode::NoError.as_frame(), Vec::new(), b"0".to_vec()],
        },
        PeerRequest::Connect {
            node_id,
            request_addr,
            publish_addr,
        } => {
            if shared.registry.is_known(&node_id) {
                tracing::warn!("rejecting connect: node id {} is taken", node_id);
                return vec![PeerCode::NodeIdTaken.as_frame()];
            }
            let descriptor = PeerDescriptor {
                id: node_id,
                request_addr,
                publish_addr,
                last_seen: Utc::now(),
            };
            if shared.registry.observe(&descriptor) {
                shared.rebuild_ring();
            }
            // The reply also carries the hashing parameters so the joiner
            // can adopt them before issuing any traffic.
            let (replicas, redundancy) = shared.ring.params();
            vec![
                PeerCode::NoError.as_frame(),
                shared.registry.local_id().as_str().as_bytes().to_vec(),
                shared.registry.local_request_addr().as_bytes().to_vec(),
                shared.registry.local_publish_addr().as_bytes().to_vec(),
                replicas.to_string().into_bytes(),
                redundancy.to_string().into_bytes(),
            ]
        }
    }
}
