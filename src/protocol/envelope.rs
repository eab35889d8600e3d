//! Routing envelope handling.
//!
//! A multipart message is `ID* "" payload...`: zero or more routing id
//! frames, one empty delimiter frame, then the payload frames. The envelope
//! kept by [`split`] includes the delimiter so a reply can simply prepend it.

/// A multipart message: a sequence of opaque byte frames.
pub type Frames = Vec<Vec<u8>>;

/// Splits a message at the first empty frame.
///
/// Returns the envelope (ids plus the empty delimiter) and the payload, or
/// `None` when no delimiter is present.
pub fn split(mut frames: Frames) -> Option<(Frames, Frames)> {
    let delimiter = frames.iter().position(|frame| frame.is_empty())?;
    let payload = frames.split_off(delimiter + 1);
    Some((frames, payload))
}

/// A reply: the request's envelope followed by the reply payload.
pub fn reply(envelope: &[Vec<u8>], payload: impl IntoIterator<Item = Vec<u8>>) -> Frames {
    let mut frames: Frames = envelope.to_vec();
    frames.extend(payload);
    frames
}

/// A request: one id frame, the delimiter, then the payload.
pub fn request(id: &[u8], payload: impl IntoIterator<Item = Vec<u8>>) -> Frames {
    let mut frames: Frames = vec![id.to_vec(), Vec::new()];
    frames.extend(payload);
    frames
}
