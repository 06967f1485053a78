pub mod block;
pub mod position;

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use block::{Block, Color};
use indexmap::IndexMap;
use indexmap::map::Entry;
use position::{BlockPos, Region};

/// A committed change to the world, reported to the [`WorldObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldChange<'a> {
    Built(&'a Block),
    Removed(&'a Block),
    /// The whole block set was swapped out (snapshot load).
    Replaced(&'a [Block]),
}

/// Receives every committed change exactly once.
///
/// Called while the store's write lock is held, right after the change
/// became visible, so observers see changes in commit order. Implementations
/// must not block or call back into the [`World`].
pub trait WorldObserver: Send + Sync + 'static {
    fn on_change(&self, change: WorldChange<'_>);
}

/// Result of [`World::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    Created(Block),
    /// The coordinate was taken; carries the untouched existing block.
    AlreadyOccupied(Block),
}

/// Result of [`World::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed(Block),
    NotFound,
    /// The coordinate holds terrain; carries the block, which stays put.
    Protected(Block),
}

struct Inner {
    /// Insertion-ordered so snapshots serialize stably.
    blocks: IndexMap<BlockPos, Block>,
    /// Seeded terrain, re-applied on [`World::replace`].
    terrain: Vec<(Region, Color)>,
}

/// The authoritative block store. Thread-safe.
///
/// A single `RwLock` guards the whole map: mutations are short and never
/// await, and a single lock is what makes [`World::snapshot`] a consistent
/// point-in-time copy and serializes racing builds on one coordinate.
pub struct World {
    inner: RwLock<Inner>,
    observer: Option<Arc<dyn WorldObserver>>,
}

impl World {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                blocks: IndexMap::new(),
                terrain: Vec::new(),
            }),
            observer: None,
        }
    }

    /// An empty world that reports committed changes to `observer`.
    pub fn with_observer(observer: Arc<dyn WorldObserver>) -> Self {
        Self {
            observer: Some(observer),
            ..Self::new()
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        // Every mutation leaves the map whole, so a poisoned lock still
        // guards a valid store.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, change: WorldChange<'_>) {
        if let Some(observer) = &self.observer {
            observer.on_change(change);
        }
    }

    /// Place a destructible block. An occupied coordinate is a no-op.
    pub fn build(&self, pos: BlockPos, color: Color) -> BuildOutcome {
        let mut inner = self.write();
        match inner.blocks.entry(pos) {
            Entry::Occupied(existing) => BuildOutcome::AlreadyOccupied(*existing.get()),
            Entry::Vacant(slot) => {
                let block = *slot.insert(Block::new(pos, color));
                self.notify(WorldChange::Built(&block));
                BuildOutcome::Created(block)
            }
        }
    }

    /// Remove the block at exactly `pos`. Terrain is never removed.
    pub fn remove(&self, pos: BlockPos) -> RemoveOutcome {
        let mut inner = self.write();
        let existing = inner.blocks.get(&pos).copied();
        match existing {
            None => RemoveOutcome::NotFound,
            Some(block) if block.indestructible => RemoveOutcome::Protected(block),
            Some(block) => {
                inner.blocks.shift_remove(&pos);
                self.notify(WorldChange::Removed(&block));
                RemoveOutcome::Removed(block)
            }
        }
    }

    /// Fill `region` with indestructible terrain, overwriting anything there.
    ///
    /// World-start only: not reported to the observer. The region is
    /// remembered so [`World::replace`] can re-derive terrain. Returns the
    /// number of blocks written.
    pub fn seed(&self, region: Region, color: Color) -> usize {
        let mut inner = self.write();
        let mut written = 0;
        for pos in region.positions() {
            inner.blocks.insert(pos, Block::terrain(pos, color));
            written += 1;
        }
        inner.terrain.push((region, color));
        tracing::debug!(
            "Seeded {} terrain blocks from {:?} to {:?}",
            written,
            region.min(),
            region.max()
        );
        written
    }

    /// Wholesale replace the block set with `records`.
    ///
    /// Seeded terrain is laid down first; a record on a terrain coordinate
    /// only re-colors it (it stays indestructible). Every other record
    /// becomes a destructible block. Only the first record per coordinate
    /// counts. Returns the new block set, which is also reported to the
    /// observer as [`WorldChange::Replaced`].
    pub fn replace<I>(&self, records: I) -> Vec<Block>
    where
        I: IntoIterator<Item = (BlockPos, Color)>,
    {
        let mut inner = self.write();

        let mut blocks = IndexMap::new();
        for (region, color) in &inner.terrain {
            for pos in region.positions() {
                blocks.insert(pos, Block::terrain(pos, *color));
            }
        }

        let mut seen = HashSet::new();
        let mut duplicates = 0usize;
        for (pos, color) in records {
            if !seen.insert(pos) {
                duplicates += 1;
                continue;
            }
            match blocks.entry(pos) {
                Entry::Occupied(mut terrain) => terrain.get_mut().color = color,
                Entry::Vacant(slot) => {
                    slot.insert(Block::new(pos, color));
                }
            }
        }
        if duplicates > 0 {
            tracing::warn!("Ignored {} duplicate block records during replace", duplicates);
        }

        inner.blocks = blocks;
        let snapshot: Vec<Block> = inner.blocks.values().copied().collect();
        self.notify(WorldChange::Replaced(&snapshot));
        snapshot
    }

    /// Consistent point-in-time copy of every block, in store order.
    pub fn snapshot(&self) -> Vec<Block> {
        self.read().blocks.values().copied().collect()
    }

    pub fn get(&self, pos: BlockPos) -> Option<Block> {
        self.read().blocks.get(&pos).copied()
    }

    pub fn contains(&self, pos: BlockPos) -> bool {
        self.read().blocks.contains_key(&pos)
    }

    pub fn len(&self) -> usize {
        self.read().blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().blocks.is_empty()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
