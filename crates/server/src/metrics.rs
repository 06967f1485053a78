//! Lock-free server counters.
//!
//! Connection tasks bump these with relaxed atomics (never blocking, never
//! allocating); the `/status` endpoint reads them at its own pace.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Instant;

pub struct Metrics {
    // Monotonic counters
    connections_opened: AtomicU64,
    connections_closed: AtomicU64,
    blocks_built: AtomicU64,
    blocks_removed: AtomicU64,
    rejected_events: AtomicU64,
    resyncs: AtomicU64,
    saves: AtomicU64,
    loads: AtomicU64,

    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            blocks_built: AtomicU64::new(0),
            blocks_removed: AtomicU64::new(0),
            rejected_events: AtomicU64::new(0),
            resyncs: AtomicU64::new(0),
            saves: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn connection_opened(&self) {
        self.connections_opened.fetch_add(1, Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Relaxed);
    }

    pub fn block_built(&self) {
        self.blocks_built.fetch_add(1, Relaxed);
    }

    pub fn block_removed(&self) {
        self.blocks_removed.fetch_add(1, Relaxed);
    }

    pub fn event_rejected(&self) {
        self.rejected_events.fetch_add(1, Relaxed);
    }

    pub fn resynced(&self) {
        self.resyncs.fetch_add(1, Relaxed);
    }

    pub fn saved(&self) {
        self.saves.fetch_add(1, Relaxed);
    }

    pub fn loaded(&self) {
        self.loads.fetch_add(1, Relaxed);
    }

    /// Read all counters. Gauges owned elsewhere are passed in.
    pub fn snapshot(&self, players: usize, blocks: usize) -> MetricsSnapshot {
        let opened = self.connections_opened.load(Relaxed);
        let closed = self.connections_closed.load(Relaxed);
        MetricsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            connections: opened.saturating_sub(closed),
            connections_total: opened,
            players: players as u64,
            blocks: blocks as u64,
            blocks_built: self.blocks_built.load(Relaxed),
            blocks_removed: self.blocks_removed.load(Relaxed),
            rejected_events: self.rejected_events.load(Relaxed),
            resyncs: self.resyncs.load(Relaxed),
            saves: self.saves.load(Relaxed),
            loads: self.loads.load(Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of [`Metrics`] at a point in time.
#[derive(Clone, Debug, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: f64,
    /// Currently open connections, joined or not.
    pub connections: u64,
    pub connections_total: u64,
    pub players: u64,
    pub blocks: u64,
    pub blocks_built: u64,
    pub blocks_removed: u64,
    pub rejected_events: u64,
    pub resyncs: u64,
    pub saves: u64,
    pub loads: u64,
}
