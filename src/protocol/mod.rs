//! Wire Protocol Module
//!
//! Frame-level definitions for the three protocols a node speaks:
//!
//! - **Peer request protocol** (`peer`): `set`/`get`/`connect` between nodes.
//! - **API protocol** (`api`): `set`/`get`/`status` from external clients.
//! - **Publish protocol** (`publish`): the periodic membership broadcast.
//!
//! All messages are sequences of opaque byte frames. Requests and replies are
//! wrapped in a routing envelope (`envelope`): any number of id frames, an
//! empty delimiter frame, then the payload. Replies echo the envelope so the
//! transport can deliver them to the requester.

pub mod api;
pub mod envelope;
pub mod peer;
pub mod publish;
pub mod timestamp;

#[cfg(test)]
mod tests;

/// Protocol version carried as the first payload frame of every request.
pub const VERSION: &[u8] = b"1";
