//! Transport Module
//!
//! Carries multipart frame messages between nodes over TCP. Three socket
//! roles exist, mirroring the protocols in [`crate::protocol`]:
//!
//! - [`request::RequestListener`] serves inbound requests (peer or API) and
//!   hands each one to the dispatcher together with a per-connection reply
//!   handle, so replies are routed back by their envelope.
//! - [`peer::PeerConnection`] is the outbound side: it tags every request
//!   with a fresh envelope id, matches replies against pending requests and
//!   silently drops replies that arrive after their deadline.
//! - [`publish::Publisher`] / [`publish::Subscriber`] implement the lossy
//!   membership broadcast channel.
//!
//! A message on the wire is one length-delimited chunk holding the
//! bincode-encoded frame sequence.

pub mod codec;
pub mod peer;
pub mod publish;
pub mod request;
