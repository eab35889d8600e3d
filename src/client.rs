//! Client for the node API protocol.
//!
//! Speaks the framed API protocol over a single connection to any node of
//! the cluster; the contacted node routes to the owners of each key.

use anyhow::Result;
use std::time::Duration;

use crate::protocol::api::{self, ApiCode};
use crate::transport::peer::PeerConnection;

/// A node's answer to `status`.
#[derive(Debug, Clone)]
pub struct NodeStatus {
    pub node_id: String,
    /// Ids of the other nodes the contacted node knows about.
    pub other_ids: Vec<String>,
    pub keys: usize,
    pub used_chars: usize,
}

pub struct ApiClient {
    connection: PeerConnection,
    deadline: Duration,
}

impl ApiClient {
    pub async fn connect(addr: &str, deadline: Duration) -> Result<Self> {
        Ok(Self {
            connection: PeerConnection::connect(addr).await?,
            deadline,
        })
    }

    /// Stores a value; an empty value deletes the key. Returns the node's
    /// status code, so callers see too-big and timeout outcomes directly.
    pub async fn set(&self, key: &str, value: &str) -> Result<ApiCode> {
        let reply = self
            .connection
            .request(api::build_set(key, value), self.deadline)
            .await?;
        let (code, _) =
            api::parse_reply(&reply).ok_or_else(|| anyhow::anyhow!("malformed set reply"))?;
        Ok(code)
    }

    /// Looks a key up. `None` is a miss; an unreachable or divergent owner
    /// is indistinguishable from one, by contract.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let reply = self
            .connection
            .request(api::build_get(key), self.deadline)
            .await?;
        let (code, rest) =
            api::parse_reply(&reply).ok_or_else(|| anyhow::anyhow!("malformed get reply"))?;
        if code != ApiCode::NoError {
            anyhow::bail!("get failed: {:?}", code);
        }
        let value = rest
            .first()
            .ok_or_else(|| anyhow::anyhow!("get reply is missing the value frame"))?;
        if value.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8(value.clone())?))
    }

    pub async fn status(&self) -> Result<NodeStatus> {
        let reply = self
            .connection
            .request(api::build_status(), self.deadline)
            .await?;
        let (code, rest) =
            api::parse_reply(&reply).ok_or_else(|| anyhow::anyhow!("malformed status reply"))?;
        if code != ApiCode::NoError {
            anyhow::bail!("status failed: {:?}", code);
        }
        let [node_id, other_ids, keys, used_chars] = rest else {
            anyhow::bail!("status reply has {} frame(s), expected 4", rest.len());
        };
        let other_ids = std::str::from_utf8(other_ids)?
            .split(',')
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        Ok(NodeStatus {
            node_id: std::str::from_utf8(node_id)?.to_string(),
            other_ids,
            keys: std::str::from_utf8(keys)?.parse()?,
            used_chars: std::str::from_utf8(used_chars)?.parse()?,
        })
    }
}
