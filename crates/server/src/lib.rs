//! Authoritative world/session synchronization server for a multiplayer
//! voxel sandbox.
//!
//! The block store lives in `craftsync-engine`; this crate adds players,
//! the broadcast router, snapshot persistence, the per-connection state
//! machine and the WebSocket transport.

pub mod accounts;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod net;
pub mod persistence;
pub mod player_registry;
pub mod protocol;
pub mod router;
pub mod state;
