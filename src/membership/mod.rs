//! Membership & Discovery Module
//!
//! Tracks the set of known peers and when each of them was last heard from.
//! Nodes learn about each other through periodic publications of the full
//! registry and through the direct `connect` handshake a joining node
//! performs against one existing peer.
//!
//! ## Core Mechanisms
//! - **Gossip by publication**: every node periodically publishes its whole
//!   registry on its publish endpoint; subscribers merge each contained
//!   descriptor. Publications are best-effort and idempotent.
//! - **Last-seen expiry**: a sweeper removes peers that have not been observed
//!   within the expiry window, so crashed nodes fall out of the view without
//!   any explicit leave message.
//! - **Derived state**: subscriptions and the hash rings are recomputed from
//!   the registry whenever the peer set changes; the registry itself never
//!   holds sockets.

pub mod registry;
pub mod types;
