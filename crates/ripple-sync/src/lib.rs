//! # Ripple Sync
//!
//! Single-writer replication for [`ripple_store`] containers. One endpoint —
//! the one whose port carries the reserved master identity — owns the
//! authoritative state for a (name, channel) pair; every other endpoint is a
//! replica that hydrates from the master's snapshot and applies only the
//! actions the master relays back.
//!
//! A replica's [`dispatch`](ripple_store::Store::dispatch) does not touch
//! local state: it forwards the action to the master with a correlation id
//! and completes once the master's relay comes back, so awaiting a dispatch
//! means awaiting authoritative application.
//!
//! [`ChannelRegistry`] multiplexes any number of independent synchronization
//! groups over one shared port, creating endpoints lazily as channels are
//! announced.

pub mod channels;
mod master;
mod replica;
mod shared;

pub use channels::{ChannelEvent, ChannelEvents, ChannelRegistry};
pub use shared::{shared_store, Role, SharedStore, SyncOptions};

/// Reserved identity of the single authoritative endpoint. A port whose id
/// equals this value is the master for every (name, channel) it serves.
pub const MASTER_PORT_ID: &str = "master";
