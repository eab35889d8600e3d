//! Consistent-Hashing Ring Module
//!
//! Maps keys to the nodes responsible for them. Every node keeps `REDUNDANCY`
//! independent rings; on each ring every node occupies `REPLICAS` virtual
//! positions derived from a keyed hash of its id. A key is owned, per ring,
//! by the node whose position first follows the key's own hash, so each key
//! ends up with up to `REDUNDANCY` distinct owners.
//!
//! Rings are immutable once built: any membership change regenerates them
//! from scratch, which keeps the ownership map a pure function of the peer
//! set. All nodes of a cluster therefore compute identical owner sets, as
//! long as they share the same hashing parameters.

pub mod index;
