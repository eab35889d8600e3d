//! Protocol Tests
//!
//! Frame-level checks for envelopes, timestamps and the three protocols.

#[cfg(test)]
mod tests {
    use crate::membership::types::{NodeId, PeerDescriptor};
    use crate::protocol::{api, envelope, peer, publish, timestamp};
    use chrono::{TimeZone, Utc};

    fn frames(parts: &[&[u8]]) -> Vec<Vec<u8>> {
        parts.iter().map(|part| part.to_vec()).collect()
    }

    // ============================================================
    // ENVELOPE TESTS
    // ============================================================

    #[test]
    fn test_envelope_split() {
        let message = frames(&[b"id-1", b"", b"1", b"get", b"key"]);

        let (envelope, payload) = envelope::split(message).unwrap();

        assert_eq!(envelope, frames(&[b"id-1", b""]));
        assert_eq!(payload, frames(&[b"1", b"get", b"key"]));
    }

    #[test]
    fn test_envelope_split_multiple_ids() {
        let message = frames(&[b"hop-a", b"hop-b", b"", b"payload"]);

        let (envelope, payload) = envelope::split(message).unwrap();

        assert_eq!(envelope, frames(&[b"hop-a", b"hop-b", b""]));
        assert_eq!(payload, frames(&[b"payload"]));
    }

    #[test]
    fn test_envelope_split_without_delimiter() {
        assert!(envelope::split(frames(&[b"no", b"delimiter"])).is_none());
    }

    #[test]
    fn test_reply_echoes_envelope() {
        let request = envelope::request(b"id-9", peer::build_get("k"));
        let (env, _) = envelope::split(request).unwrap();

        let reply = envelope::reply(&env, [peer::PeerCode::NoError.as_frame()]);

        assert_eq!(reply, frames(&[b"id-9", b"", b"0"]));
    }

    // ============================================================
    // TIMESTAMP TESTS
    // ============================================================

    #[test]
    fn test_timestamp_renders_zero_padded() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 2, 9, 5, 4).unwrap();
        assert_eq!(timestamp::render(ts), "2026:08:02:09:05:04");
    }

    #[test]
    fn test_timestamp_parses_exact_width() {
        let ts = timestamp::parse("2026:08:02:09:05:04").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 8, 2, 9, 5, 4).unwrap());
    }

    #[test]
    fn test_timestamp_rejects_garbage() {
        assert!(timestamp::parse("").is_none());
        assert!(timestamp::parse("2026:08:02").is_none());
        assert!(timestamp::parse("2026:08:02:09:05:04:00").is_none());
        assert!(timestamp::parse("2026:13:02:09:05:04").is_none());
        assert!(timestamp::parse("not:a:time:at:all:!").is_none());
    }

    // ============================================================
    // PEER PROTOCOL TESTS
    // ============================================================

    #[test]
    fn test_peer_set_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let payload = peer::build_set("key", "value", ts);

        let request = peer::parse(&payload).unwrap();

        assert_eq!(
            request,
            peer::PeerRequest::Set {
                key: "key".to_string(),
                value: "value".to_string(),
                timestamp: ts,
            }
        );
    }

    #[test]
    fn test_peer_connect_roundtrip() {
        let payload = peer::build_connect(
            &NodeId("node-a".to_string()),
            "127.0.0.1:8000",
            "127.0.0.1:8001",
        );

        let request = peer::parse(&payload).unwrap();

        assert_eq!(
            request,
            peer::PeerRequest::Connect {
                node_id: NodeId("node-a".to_string()),
                request_addr: "127.0.0.1:8000".to_string(),
                publish_addr: "127.0.0.1:8001".to_string(),
            }
        );
    }

    #[test]
    fn test_peer_rejects_wrong_version() {
        let payload = frames(&[b"2", b"get", b"key"]);
        assert_eq!(peer::parse(&payload), Err(peer::PeerCode::VersionNotSupported));
    }

    #[test]
    fn test_peer_version_checked_before_verb() {
        // Even an unknown verb reports the version mismatch first.
        let payload = frames(&[b"7", b"frobnicate"]);
        assert_eq!(peer::parse(&payload), Err(peer::PeerCode::VersionNotSupported));
    }

    #[test]
    fn test_peer_rejects_unknown_verb() {
        let payload = frames(&[b"1", b"frobnicate", b"key"]);
        assert_eq!(peer::parse(&payload), Err(peer::PeerCode::UnknownRequest));
    }

    #[test]
    fn test_peer_rejects_missing_params() {
        assert_eq!(
            peer::parse(&frames(&[b"1", b"set", b"key"])),
            Err(peer::PeerCode::UnknownRequest)
        );
        assert_eq!(peer::parse(&[]), Err(peer::PeerCode::UnknownRequest));
    }

    #[test]
    fn test_peer_reply_parses_code_and_frames() {
        let payload = frames(&[b"0", b"value", b"2026:08:02:09:05:04"]);

        let (code, rest) = peer::parse_reply(&payload).unwrap();

        assert_eq!(code, peer::PeerCode::NoError);
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn test_peer_code_frames() {
        for code in [
            peer::PeerCode::NoError,
            peer::PeerCode::TooBig,
            peer::PeerCode::NodeIdTaken,
            peer::PeerCode::UnknownRequest,
            peer::PeerCode::VersionNotSupported,
        ] {
            assert_eq!(peer::PeerCode::from_frame(&code.as_frame()), Some(code));
        }
        assert_eq!(peer::PeerCode::from_frame(b"5"), None);
    }

    // ============================================================
    // API PROTOCOL TESTS
    // ============================================================

    #[test]
    fn test_api_set_has_no_timestamp() {
        let payload = api::build_set("key", "value");

        assert_eq!(payload.len(), 4);
        let request = api::parse(&payload).unwrap();
        assert_eq!(
            request,
            api::ApiRequest::Set {
                key: "key".to_string(),
                value: "value".to_string(),
            }
        );
    }

    #[test]
    fn test_api_status_roundtrip() {
        assert_eq!(api::parse(&api::build_status()), Ok(api::ApiRequest::Status));
    }

    #[test]
    fn test_api_rejects_wrong_version() {
        let payload = frames(&[b"9", b"get", b"key"]);
        assert_eq!(api::parse(&payload), Err(api::ApiCode::VersionNotSupported));
    }

    #[test]
    fn test_api_rejects_connect_verb() {
        // `connect` belongs to the peer protocol only.
        let payload = frames(&[b"1", b"connect", b"id", b"req", b"pub"]);
        assert_eq!(api::parse(&payload), Err(api::ApiCode::UnknownRequest));
    }

    // ============================================================
    // PUBLISH PROTOCOL TESTS
    // ============================================================

    fn descriptor(id: &str) -> PeerDescriptor {
        PeerDescriptor {
            id: NodeId(id.to_string()),
            request_addr: format!("127.0.0.1:{}", 8000),
            publish_addr: format!("127.0.0.1:{}", 8001),
            last_seen: Utc.with_ymd_and_hms(2026, 8, 2, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_publish_roundtrip() {
        let snapshot = vec![descriptor("node-a"), descriptor("node-b")];

        let frames = publish::build(&snapshot);
        assert_eq!(frames[0], b"n".to_vec());
        assert_eq!(frames.len(), 1 + 2 * 4);

        let parsed = publish::parse(&frames).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_publish_rejects_foreign_topic() {
        assert!(publish::parse(&frames(&[b"x", b"a", b"b", b"c", b"d"])).is_none());
        assert!(publish::parse(&[]).is_none());
    }

    #[test]
    fn test_publish_skips_malformed_groups() {
        let mut message = publish::build(&[descriptor("node-a")]);
        // A truncated trailing group must not break the valid one.
        message.push(b"dangling-id".to_vec());

        let parsed = publish::parse(&message).unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, NodeId("node-a".to_string()));
    }
}
