//! Client API routing.
//!
//! Writes are stamped here and fanned out to every owner of the key; reads
//! race all owners and the first value wins. A single deadline bounds each
//! request; owners that stay silent turn a write into a timeout, while a
//! silent read simply counts as a miss.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::sync::Arc;

use super::server::Shared;
use crate::membership::types::NodeId;
use crate::protocol::api::{ApiCode, ApiRequest};
use crate::protocol::envelope::{self, Frames};
use crate::protocol::api;
use crate::protocol::peer::{self, PeerCode};
use crate::transport::request::InboundRequest;

/// Serves one message from the API endpoint.
pub async fn handle(shared: &Arc<Shared>, request: InboundRequest) {
    let payload = match api::parse(&request.payload) {
        Ok(ApiRequest::Set { key, value }) => handle_set(shared, &key, &value).await,
        Ok(ApiRequest::Get { key }) => handle_get(shared, &key).await,
        Ok(ApiRequest::Status) => handle_status(shared),
        Err(code) => {
            tracing::debug!("rejecting api request: {:?}", code);
            vec![code.as_frame()]
        }
    };
    let reply = envelope::reply(&request.envelope, payload);
    request.reply.send(reply).await;
}

async fn handle_set(shared: &Arc<Shared>, key: &str, value: &str) -> Frames {
    // An entry that can never fit is refused before any fan-out.
    let size = key.chars().count() + value.chars().count();
    if size > shared.config.max_size {
        return vec![ApiCode::TooBig.as_frame()];
    }

    let timestamp = Utc::now();
    let owners = shared.ring.owners(key);
    tracing::debug!("set {} goes to {} owner(s)", key, owners.len());

    let outcomes = futures::future::join_all(
        owners
            .iter()
            .map(|owner| set_on_owner(shared, owner, key, value, timestamp)),
    )
    .await;

    let code = if outcomes.iter().any(|outcome| outcome.is_none()) {
        // At least one owner never answered within the deadline.
        ApiCode::Timeout
    } else if outcomes.contains(&Some(PeerCode::TooBig)) {
        ApiCode::TooBig
    } else if outcomes.iter().all(|outcome| *outcome == Some(PeerCode::NoError)) {
        ApiCode::NoError
    } else {
        ApiCode::UnknownRequest
    };
    vec![code.as_frame()]
}

/// One leg of the write fan-out. `None` means the owner did not answer.
async fn set_on_owner(
    shared: &Arc<Shared>,
    owner: &NodeId,
    key: &str,
    value: &str,
    timestamp: DateTime<Utc>,
) -> Option<PeerCode> {
    if owner == shared.registry.local_id() {
        return Some(match shared.cache.put(key, value, timestamp) {
            Ok(()) => PeerCode::NoError,
            Err(_) => PeerCode::TooBig,
        });
    }
    let connection = shared.connection(owner).await?;
    let reply = connection
        .request(
            peer::build_set(key, value, timestamp),
            shared.config.request_deadline,
        )
        .await
        .ok()?;
    let (code, _) = peer::parse_reply(&reply)?;
    Some(code)
}

async fn handle_get(shared: &Arc<Shared>, key: &str) -> Frames {
    let owners = shared.ring.owners(key);
    let mut lookups: FuturesUnordered<_> = owners
        .iter()
        .map(|owner| get_from_owner(shared, owner, key))
        .collect();

    let deadline = tokio::time::Instant::now() + shared.config.request_deadline;
    loop {
        match tokio::time::timeout_at(deadline, lookups.next()).await {
            // First reply with a value wins.
            Ok(Some(Some(value))) if !value.is_empty() => {
                return vec![ApiCode::NoError.as_frame(), value.into_bytes()];
            }
            // A miss or an unreachable owner; keep racing the rest.
            Ok(Some(_)) => continue,
            // Every owner missed, or the deadline elapsed: both are a miss,
            // a late write is indistinguishable from an absent key anyway.
            Ok(None) | Err(_) => {
                return vec![ApiCode::NoError.as_frame(), Vec::new()];
            }
        }
    }
}

/// One leg of the read race. `Some("")` is a definite miss, `None` an owner
/// that could not be asked.
async fn get_from_owner(shared: &Arc<Shared>, owner: &NodeId, key: &str) -> Option<String> {
    if owner == shared.registry.local_id() {
        let value = shared
            .cache
            .get(key)
            .map(|entry| entry.value)
            .unwrap_or_default();
        return Some(value);
    }
    let connection = shared.connection(owner).await?;
    let reply = connection
        .request(peer::build_get(key), shared.config.request_deadline)
        .await
        .ok()?;
    let (code, rest) = peer::parse_reply(&reply)?;
    if code != PeerCode::NoError {
        tracing::warn!("get on owner {} failed: {:?}", owner, code);
        return None;
    }
    // Replies carry a timestamp after the value; it is not used to pick a
    // winner, the first arrival is.
    String::from_utf8(rest.first()?.clone()).ok()
}

fn handle_status(shared: &Arc<Shared>) -> Frames {
    let mut other_ids: Vec<String> = shared
        .registry
        .peers()
        .into_iter()
        .map(|peer| peer.id.to_string())
        .collect();
    other_ids.sort();
    vec![
        ApiCode::NoError.as_frame(),
        shared.registry.local_id().as_str().as_bytes().to_vec(),
        other_ids.join(",").into_bytes(),
        shared.cache.len().to_string().into_bytes(),
        shared.cache.used().to_string().into_bytes(),
    ]
}
