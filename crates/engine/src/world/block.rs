use super::position::BlockPos;

/// Packed `0xRRGGBB` block color. The engine stores it without interpreting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    /// Color given to blocks built without one.
    pub const DEFAULT: Color = Color(0x00ff00);

    pub const fn new(rgb: u32) -> Self {
        Self(rgb)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A single block in the world.
///
/// Identity is `pos`. `indestructible` blocks only come from seeding and are
/// never removed by [`World::remove`](super::World::remove).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Block {
    pub pos: BlockPos,
    pub color: Color,
    pub indestructible: bool,
}

impl Block {
    pub const fn new(pos: BlockPos, color: Color) -> Self {
        Self {
            pos,
            color,
            indestructible: false,
        }
    }

    pub const fn terrain(pos: BlockPos, color: Color) -> Self {
        Self {
            pos,
            color,
            indestructible: true,
        }
    }
}
