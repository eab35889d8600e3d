//! The client-facing API protocol.
//!
//! Mirrors the peer protocol minus the timestamp on `set` (the serving node
//! stamps writes at ingress) and minus `connect`; adds `status`.

use super::VERSION;
use super::envelope::Frames;

/// Status code frame of an API reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCode {
    NoError,
    TooBig,
    Timeout,
    UnknownRequest,
    VersionNotSupported,
}

impl ApiCode {
    pub fn as_frame(self) -> Vec<u8> {
        let code: &[u8] = match self {
            ApiCode::NoError => b"0",
            ApiCode::TooBig => b"1",
            ApiCode::Timeout => b"2",
            ApiCode::UnknownRequest => b"998",
            ApiCode::VersionNotSupported => b"999",
        };
        code.to_vec()
    }

    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        match frame {
            b"0" => Some(ApiCode::NoError),
            b"1" => Some(ApiCode::TooBig),
            b"2" => Some(ApiCode::Timeout),
            b"998" => Some(ApiCode::UnknownRequest),
            b"999" => Some(ApiCode::VersionNotSupported),
            _ => None,
        }
    }
}

/// A parsed inbound API request.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiRequest {
    Set { key: String, value: String },
    Get { key: String },
    Status,
}

pub fn parse(payload: &[Vec<u8>]) -> Result<ApiRequest, ApiCode> {
    let version = payload.first().ok_or(ApiCode::UnknownRequest)?;
    if version != VERSION {
        return Err(ApiCode::VersionNotSupported);
    }
    let verb = payload.get(1).ok_or(ApiCode::UnknownRequest)?;
    let params = &payload[2..];
    match verb.as_slice() {
        b"set" => {
            let [key, value] = params else {
                return Err(ApiCode::UnknownRequest);
            };
            Ok(ApiRequest::Set {
                key: text(key)?.to_string(),
                value: text(value)?.to_string(),
            })
        }
        b"get" => {
            let [key] = params else {
                return Err(ApiCode::UnknownRequest);
            };
            Ok(ApiRequest::Get {
                key: text(key)?.to_string(),
            })
        }
        b"status" => {
            if !params.is_empty() {
                return Err(ApiCode::UnknownRequest);
            }
            Ok(ApiRequest::Status)
        }
        _ => Err(ApiCode::UnknownRequest),
    }
}

fn text(frame: &[u8]) -> Result<&str, ApiCode> {
    std::str::from_utf8(frame).map_err(|_| ApiCode::UnknownRequest)
}

pub fn build_set(key: &str, value: &str) -> Frames {
    vec![
        VERSION.to_vec(),
        b"set".to_vec(),
        key.as_bytes().to_vec(),
        value.as_bytes().to_vec(),
    ]
}

pub fn build_get(key: &str) -> Frames {
    vec![VERSION.to_vec(), b"get".to_vec(), key.as_bytes().to_vec()]
}

pub fn build_status() -> Frames {
    vec![VERSION.to_vec(), b"status".to_vec()]
}

/// Splits a reply payload into its status code and the remaining frames.
pub fn parse_reply(payload: &[Vec<u8>]) -> Option<(ApiCode, &[Vec<u8>])> {
    let code = ApiCode::from_frame(payload.first()?)?;
    Some((code, &payload[1..]))
}
