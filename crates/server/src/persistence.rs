//! World snapshot persistence.
//!
//! A snapshot is a JSON array of `{x, y, z, color}` records in store order.
//! Indestructibility is not saved: it is re-derived from the seeded terrain
//! when a snapshot is loaded.
//!
//! Both directions keep file I/O off the store lock: `save` copies the block
//! set and writes it on the blocking pool; `load` reads and parses the whole
//! file before it touches the live world.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use craftsync_engine::world::World;
use craftsync_engine::world::block::Block;
use tokio::sync::Mutex;

use crate::protocol::BlockRecord;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("no saved world at {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed snapshot {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("persistence task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Save/load gateway for one snapshot file.
pub struct Persistence {
    path: PathBuf,
    /// Serializes file access between concurrent save/load requests. Never
    /// held together with the world lock.
    io_lock: Mutex<()>,
}

impl Persistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current block set to disk. Returns the number of blocks
    /// saved.
    pub async fn save(&self, world: &World) -> Result<usize, PersistError> {
        let records: Vec<BlockRecord> = world.snapshot().iter().map(BlockRecord::from).collect();
        let count = records.len();

        let _io = self.io_lock.lock().await;
        let start = Instant::now();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &records)).await??;

        tracing::info!(
            "World saved: {} blocks to {} ({:.2?})",
            count,
            self.path.display(),
            start.elapsed(),
        );
        Ok(count)
    }

    /// Replace the live world with the saved snapshot. On any error the
    /// world is left exactly as it was.
    pub async fn load(&self, world: &World) -> Result<Vec<Block>, PersistError> {
        let _io = self.io_lock.lock().await;
        let start = Instant::now();
        let path = self.path.clone();
        let records = tokio::task::spawn_blocking(move || read_snapshot(&path)).await??;

        let blocks = world.replace(records.iter().map(|r| (r.pos(), r.color())));
        tracing::info!(
            "World loaded: {} records from {} -> {} blocks ({:.2?})",
            records.len(),
            self.path.display(),
            blocks.len(),
            start.elapsed(),
        );
        Ok(blocks)
    }
}

// ── File format ─────────────────────────────────────────────────────────

/// Write `records` to `path` atomically: a sibling temp file is written and
/// synced, then renamed over the target. A failed write leaves any previous
/// snapshot intact.
pub fn write_snapshot(path: &Path, records: &[BlockRecord]) -> Result<(), PersistError> {
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let bytes = serde_json::to_vec(records).map_err(|source| PersistError::Format {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp = temp_path(path);
    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(&bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    drop(file);
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Read and fully parse the snapshot at `path`.
pub fn read_snapshot(path: &Path) -> Result<Vec<BlockRecord>, PersistError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(PersistError::NotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&bytes).map_err(|source| PersistError::Format {
        path: path.to_path_buf(),
        source,
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use craftsync_engine::world::block::Color;
    use craftsync_engine::world::position::{BlockPos, Region};

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("craftsync_test_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn snapshot_file_is_plain_record_list() {
        let dir = scratch("format");
        let path = dir.join("world.json");
        let records = vec![
            BlockRecord { x: 5, y: 0, z: 5, color: 0xff0000 },
            BlockRecord { x: -1, y: 3, z: 2, color: 0x00ff00 },
        ];
        write_snapshot(&path, &records).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(value[0], serde_json::json!({"x": 5, "y": 0, "z": 5, "color": 0xff0000}));
        assert!(!temp_path(&path).exists());
        assert_eq!(read_snapshot(&path).unwrap(), records);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = scratch("missing");
        let err = read_snapshot(&dir.join("nope.json")).unwrap_err();
        assert!(matches!(err, PersistError::NotFound(_)));
    }

    #[tokio::test]
    async fn save_then_load_reproduces_block_set() {
        let dir = scratch("roundtrip");
        let persistence = Persistence::new(dir.join("world.json"));

        let world = World::new();
        world.seed(Region::plane(-1, 2), Color(0x555555));
        world.build(BlockPos::new(5, 0, 5), Color(0xff0000));
        world.build(BlockPos::new(1, 1, 1), Color(0x0000ff));

        let saved = persistence.save(&world).await.unwrap();
        assert_eq!(saved, 27);

        let before: HashSet<Block> = world.snapshot().into_iter().collect();
        persistence.load(&world).await.unwrap();
        let after: HashSet<Block> = world.snapshot().into_iter().collect();
        assert_eq!(before, after);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn failed_load_leaves_world_untouched() {
        let dir = scratch("corrupt");
        let path = dir.join("world.json");
        fs::create_dir_all(&dir).unwrap();
        fs::write(&path, b"[{\"x\": 1, \"y\": 2").unwrap();

        let world = World::new();
        world.build(BlockPos::new(9, 9, 9), Color::DEFAULT);
        let before = world.snapshot();

        let err = Persistence::new(&path).load(&world).await.unwrap_err();
        assert!(matches!(err, PersistError::Format { .. }));
        assert_eq!(world.snapshot(), before);

        let missing = Persistence::new(dir.join("other.json")).load(&world).await.unwrap_err();
        assert!(matches!(missing, PersistError::NotFound(_)));
        assert_eq!(world.snapshot(), before);

        let _ = fs::remove_dir_all(&dir);
    }
}
