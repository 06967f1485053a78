use std::fmt;

/// Absolute block position in the world. This is a block's identity: the
/// store holds at most one block per position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<(i64, i64, i64)> for BlockPos {
    fn from((x, y, z): (i64, i64, i64)) -> Self {
        Self::new(x, y, z)
    }
}

/// Inclusive axis-aligned box of block positions.
///
/// Corners are normalized on construction, so `min <= max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    min: BlockPos,
    max: BlockPos,
}

impl Region {
    pub fn new(a: BlockPos, b: BlockPos) -> Self {
        Self {
            min: BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// A one-block-thick square plane at height `y`, spanning
    /// `-radius..=radius` on x and z.
    pub fn plane(y: i64, radius: i64) -> Self {
        let r = radius.abs();
        Self::new(BlockPos::new(-r, y, -r), BlockPos::new(r, y, r))
    }

    pub const fn min(&self) -> BlockPos {
        self.min
    }

    pub const fn max(&self) -> BlockPos {
        self.max
    }

    pub const fn contains(&self, pos: BlockPos) -> bool {
        pos.x >= self.min.x
            && pos.x <= self.max.x
            && pos.y >= self.min.y
            && pos.y <= self.max.y
            && pos.z >= self.min.z
            && pos.z <= self.max.z
    }

    /// Number of positions inside the region.
    pub fn volume(&self) -> u64 {
        let span = |lo: i64, hi: i64| (hi - lo) as u64 + 1;
        span(self.min.x, self.max.x) * span(self.min.y, self.max.y) * span(self.min.z, self.max.z)
    }

    /// Every position in the region, y outermost then z then x.
    pub fn positions(&self) -> impl Iterator<Item = BlockPos> + '_ {
        (self.min.y..=self.max.y).flat_map(move |y| {
            (self.min.z..=self.max.z).flat_map(move |z| {
                (self.min.x..=self.max.x).map(move |x| BlockPos::new(x, y, z))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_normalizes_corners() {
        let r = Region::new(BlockPos::new(3, 0, -2), BlockPos::new(-1, 2, 4));
        assert_eq!(r.min(), BlockPos::new(-1, 0, -2));
        assert_eq!(r.max(), BlockPos::new(3, 2, 4));
    }

    #[test]
    fn plane_volume_and_membership() {
        let r = Region::plane(-1, 2);
        assert_eq!(r.volume(), 25);
        assert_eq!(r.positions().count(), 25);
        assert!(r.contains(BlockPos::new(2, -1, -2)));
        assert!(!r.contains(BlockPos::new(2, 0, -2)));
        assert!(!r.contains(BlockPos::new(3, -1, 0)));
    }
}
