//! Node Module
//!
//! Assembles the registry, rings, cache and transport into a running cache
//! node and hosts the two request-serving roles:
//!
//! - **`peer_handler`**: answers `set`/`get`/`connect` arriving from other
//!   nodes on the request endpoint, straight against the local store and
//!   registry.
//! - **`api_router`**: answers client `set`/`get`/`status` on the API
//!   endpoint by routing to the owners of the key, fanning writes out to all
//!   of them and racing reads across them.
//!
//! `server::Node` owns the background loops: publishing the registry,
//! reconciling subscriptions, merging inbound publications and sweeping
//! expired peers.

pub mod api_router;
pub mod peer_handler;
pub mod server;
