//! Block store tests: uniqueness, terrain protection, snapshot consistency
//! and observer reporting, without any networking.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use craftsync_engine::world::block::{Block, Color};
use craftsync_engine::world::position::{BlockPos, Region};
use craftsync_engine::world::{BuildOutcome, RemoveOutcome, World, WorldChange, WorldObserver};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Records every reported change as a short string.
#[derive(Default)]
struct Recorder {
    log: Mutex<Vec<String>>,
}

impl Recorder {
    fn entries(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl WorldObserver for Recorder {
    fn on_change(&self, change: WorldChange<'_>) {
        let entry = match change {
            WorldChange::Built(b) => format!("built {},{},{}", b.pos.x, b.pos.y, b.pos.z),
            WorldChange::Removed(b) => format!("removed {},{},{}", b.pos.x, b.pos.y, b.pos.z),
            WorldChange::Replaced(blocks) => format!("replaced {}", blocks.len()),
        };
        self.log.lock().unwrap().push(entry);
    }
}

fn observed_world() -> (World, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let world = World::with_observer(recorder.clone());
    (world, recorder)
}

const RED: Color = Color(0xff0000);
const BLUE: Color = Color(0x0000ff);
const GROUND: Color = Color(0x555555);

// ---------------------------------------------------------------------------
// Build / remove
// ---------------------------------------------------------------------------

#[test]
fn build_creates_block() {
    let (world, rec) = observed_world();
    let pos = BlockPos::new(5, 0, 5);
    assert_eq!(world.build(pos, RED), BuildOutcome::Created(Block::new(pos, RED)));
    assert_eq!(world.get(pos), Some(Block::new(pos, RED)));
    assert_eq!(rec.entries(), vec!["built 5,0,5"]);
}

#[test]
fn build_on_occupied_is_noop_and_keeps_color() {
    let (world, rec) = observed_world();
    let pos = BlockPos::new(1, 2, 3);
    world.build(pos, RED);
    let outcome = world.build(pos, BLUE);
    assert_eq!(outcome, BuildOutcome::AlreadyOccupied(Block::new(pos, RED)));
    assert_eq!(world.len(), 1);
    assert_eq!(world.get(pos).unwrap().color, RED);
    assert_eq!(rec.entries().len(), 1, "no-op build must not be reported");
}

#[test]
fn remove_existing_then_missing() {
    let (world, rec) = observed_world();
    let pos = BlockPos::new(5, 0, 5);
    world.build(pos, RED);
    assert_eq!(world.remove(pos), RemoveOutcome::Removed(Block::new(pos, RED)));
    assert_eq!(world.remove(pos), RemoveOutcome::NotFound);
    assert!(world.is_empty());
    assert_eq!(rec.entries(), vec!["built 5,0,5", "removed 5,0,5"]);
}

#[test]
fn terrain_is_protected() {
    let (world, rec) = observed_world();
    world.seed(Region::plane(-1, 2), GROUND);
    let pos = BlockPos::new(0, -1, 0);

    let outcome = world.remove(pos);
    assert_eq!(outcome, RemoveOutcome::Protected(Block::terrain(pos, GROUND)));
    assert!(world.contains(pos));
    assert!(world.get(pos).unwrap().indestructible);

    // Building on terrain is an ordinary occupied no-op.
    assert!(matches!(world.build(pos, RED), BuildOutcome::AlreadyOccupied(_)));
    assert!(rec.entries().is_empty(), "seeding is not reported");
}

#[test]
fn seed_fills_region() {
    let world = World::new();
    let written = world.seed(Region::plane(-1, 3), GROUND);
    assert_eq!(written, 49);
    assert_eq!(world.len(), 49);
    assert!(world.snapshot().iter().all(|b| b.indestructible));
}

// ---------------------------------------------------------------------------
// Replace
// ---------------------------------------------------------------------------

#[test]
fn replace_is_destructive_and_rederives_terrain() {
    let (world, rec) = observed_world();
    world.seed(Region::plane(-1, 1), GROUND);
    world.build(BlockPos::new(9, 0, 9), RED);

    let records = vec![
        (BlockPos::new(0, -1, 0), BLUE), // terrain coordinate: recolor only
        (BlockPos::new(2, 0, 2), RED),
        (BlockPos::new(2, 0, 2), BLUE), // duplicate: ignored
    ];
    let blocks = world.replace(records);

    assert_eq!(blocks.len(), 10);
    assert!(!world.contains(BlockPos::new(9, 0, 9)), "unsaved build is lost");
    assert_eq!(world.get(BlockPos::new(2, 0, 2)), Some(Block::new(BlockPos::new(2, 0, 2), RED)));

    let recolored = world.get(BlockPos::new(0, -1, 0)).unwrap();
    assert_eq!(recolored.color, BLUE);
    assert!(recolored.indestructible);

    assert_eq!(rec.entries().last().unwrap(), "replaced 10");
}

#[test]
fn replace_with_snapshot_reproduces_block_set() {
    let world = World::new();
    world.seed(Region::plane(-1, 2), GROUND);
    for i in 0..10 {
        world.build(BlockPos::new(i, i % 3, -i), Color::new(i as u32 * 1000));
    }
    world.remove(BlockPos::new(4, 1, -4));

    let before = world.snapshot();
    world.replace(before.iter().map(|b| (b.pos, b.color)));
    let after = world.snapshot();

    let a: HashSet<Block> = before.into_iter().collect();
    let b: HashSet<Block> = after.into_iter().collect();
    assert_eq!(a, b);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_builds_on_one_coordinate_create_once() {
    let (world, rec) = observed_world();
    let pos = BlockPos::new(7, 7, 7);
    let threads = 16;

    let outcomes: Vec<BuildOutcome> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let world = &world;
                s.spawn(move || world.build(pos, Color::new(i)))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let created = outcomes
        .iter()
        .filter(|o| matches!(o, BuildOutcome::Created(_)))
        .count();
    assert_eq!(created, 1);
    assert_eq!(outcomes.len() - created, threads as usize - 1);
    assert_eq!(world.len(), 1);
    assert_eq!(rec.entries(), vec!["built 7,7,7"]);
}

#[test]
fn snapshots_never_see_duplicate_coordinates() {
    let world = World::new();
    std::thread::scope(|s| {
        for t in 0..4i64 {
            let world = &world;
            s.spawn(move || {
                for i in 0..200i64 {
                    let pos = BlockPos::new(i % 20, 0, t % 2);
                    world.build(pos, Color::DEFAULT);
                    world.remove(pos);
                }
            });
        }
        let world = &world;
        s.spawn(move || {
            for _ in 0..200 {
                let snap = world.snapshot();
                let unique: HashSet<BlockPos> = snap.iter().map(|b| b.pos).collect();
                assert_eq!(unique.len(), snap.len());
            }
        });
    });
}
