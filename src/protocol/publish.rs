//! The membership publish protocol.
//!
//! A publication is the topic frame `"n"` followed by one group of four
//! frames per known node: id, request address, publish address, last-seen.

use super::envelope::Frames;
use super::timestamp;
use crate::membership::types::{NodeId, PeerDescriptor};

pub const TOPIC: &[u8] = b"n";

pub fn build(snapshot: &[PeerDescriptor]) -> Frames {
    let mut frames: Frames = Vec::with_capacity(1 + snapshot.len() * 4);
    frames.push(TOPIC.to_vec());
    for descriptor in snapshot {
        frames.push(descriptor.id.as_str().as_bytes().to_vec());
        frames.push(descriptor.request_addr.as_bytes().to_vec());
        frames.push(descriptor.publish_addr.as_bytes().to_vec());
        frames.push(timestamp::render(descriptor.last_seen).into_bytes());
    }
    frames
}

/// Parses a publication. Returns `None` for a foreign topic; malformed
/// descriptor groups are skipped.
pub fn parse(frames: &[Vec<u8>]) -> Option<Vec<PeerDescriptor>> {
    if frames.first().map(Vec::as_slice) != Some(TOPIC) {
        return None;
    }
    let mut descriptors = Vec::new();
    for group in frames[1..].chunks_exact(4) {
        let Ok(id) = std::str::from_utf8(&group[0]) else {
            continue;
        };
        let Ok(request_addr) = std::str::from_utf8(&group[1]) else {
            continue;
        };
        let Ok(publish_addr) = std::str::from_utf8(&group[2]) else {
            continue;
        };
        let Some(last_seen) =
            std::str::from_utf8(&group[3]).ok().and_then(timestamp::parse)
        else {
            continue;
        };
        descriptors.push(PeerDescriptor {
            id: NodeId(id.to_string()),
            request_addr: request_addr.to_string(),
            publish_addr: publish_addr.to_string(),
            last_seen,
        });
    }
    Some(descriptors)
}
