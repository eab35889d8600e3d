//! The request protocol spoken between nodes.

use chrono::{DateTime, Utc};

use super::envelope::Frames;
use super::{VERSION, timestamp};
use crate::membership::types::NodeId;

/// Status code frame of a peer reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerCode {
    NoError,
    TooBig,
    NodeIdTaken,
    UnknownRequest,
    VersionNotSupported,
}

impl PeerCode {
    pub fn as_frame(self) -> Vec<u8> {
        let code: &[u8] = match self {
            PeerCode::NoError => b"0",
            PeerCode::TooBig => b"1",
            PeerCode::NodeIdTaken => b"997",
            PeerCode::UnknownRequest => b"998",
            PeerCode::VersionNotSupported => b"999",
        };
        code.to_vec()
    }

    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        match frame {
            b"0" => Some(PeerCode::NoError),
            b"1" => Some(PeerCode::TooBig),
            b"997" => Some(PeerCode::NodeIdTaken),
            b"998" => Some(PeerCode::UnknownRequest),
            b"999" => Some(PeerCode::VersionNotSupported),
            _ => None,
        }
    }
}

/// A parsed inbound peer request.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerRequest {
    Set {
        key: String,
        value: String,
        timestamp: DateTime<Utc>,
    },
    Get {
        key: String,
    },
    Connect {
        node_id: NodeId,
        request_addr: String,
        publish_addr: String,
    },
}

/// Parses a request payload (the frames after the envelope).
///
/// The version gate runs before dispatch; anything else that does not form a
/// well-known request is answered with `UnknownRequest`.
pub fn parse(payload: &[Vec<u8>]) -> Result<PeerRequest, PeerCode> {
    let version = payload.first().ok_or(PeerCode::UnknownRequest)?;
    if version != VERSION {
        return Err(PeerCode::VersionNotSupported);
    }
    let verb = payload.get(1).ok_or(PeerCode::UnknownRequest)?;
    let params = &payload[2..];
    match verb.as_slice() {
        b"set" => {
            let [key, value, timestamp] = params else {
                return Err(PeerCode::UnknownRequest);
            };
            let timestamp =
                timestamp::parse(text(timestamp)?).ok_or(PeerCode::UnknownRequest)?;
            Ok(PeerRequest::Set {
                key: text(key)?.to_string(),
                value: text(value)?.to_string(),
                timestamp,
            })
        }
        b"get" => {
            let [key] = params else {
                return Err(PeerCode::UnknownRequest);
            };
            Ok(PeerRequest::Get {
                key: text(key)?.to_string(),
            })
        }
        b"connect" => {
            let [node_id, request_addr, publish_addr] = params else {
                return Err(PeerCode::UnknownRequest);
            };
            Ok(PeerRequest::Connect {
                node_id: NodeId(text(node_id)?.to_string()),
                request_addr: text(request_addr)?.to_string(),
                publish_addr: text(publish_addr)?.to_string(),
            })
        }
        _ => Err(PeerCode::UnknownRequest),
    }
}

fn text(frame: &[u8]) -> Result<&str, PeerCode> {
    std::str::from_utf8(frame).map_err(|_| PeerCode::UnknownRequest)
}

pub fn build_set(key: &str, value: &str, timestamp: DateTime<Utc>) -> Frames {
    vec![
        VERSION.to_vec(),
        b"set".to_vec(),
        key.as_bytes().to_vec(),
        value.as_bytes().to_vec(),
        timestamp::render(timestamp).into_bytes(),
    ]
}

pub fn build_get(key: &str) -> Frames {
    vec![VERSION.to_vec(), b"get".to_vec(), key.as_bytes().to_vec()]
}

pub fn build_connect(node_id: &NodeId, request_addr: &str, publish_addr: &str) -> Frames {
    vec![
        VERSION.to_vec(),
        b"connect".to_vec(),
        node_id.as_str().as_bytes().to_vec(),
        request_addr.as_bytes().to_vec(),
        publish_addr.as_bytes().to_vec(),
    ]
}

/// Splits a reply payload into its status code and the remaining frames.
pub fn parse_reply(payload: &[Vec<u8>]) -> Option<(PeerCode, &[Vec<u8>])> {
    let code = PeerCode::from_frame(payload.first()?)?;
    Some((code, &payload[1..]))
}
