//! Authoritative voxel block store.
//!
//! The engine knows nothing about players or the network: it owns the block
//! set, enforces coordinate uniqueness and terrain protection, and reports
//! each committed change to a [`world::WorldObserver`].

pub mod world;
