//! Tree and huge-mushroom placement for sapling crops.

use crate::blocks;
use crate::chunk::{BlockId, BlockPos, Voxel, CHUNK_SIZE_Y};
use crate::terrain::Terrain;

/// Tree type variations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeType {
    Oak,
    Birch,
    Acacia,
    DarkOak,
    Jungle,
    BrownMushroom,
    RedMushroom,
}

impl TreeType {
    /// Get log (or stem) block ID for this tree type.
    pub fn log_block(self) -> BlockId {
        match self {
            TreeType::Oak => blocks::LOG,
            TreeType::Birch => blocks::BIRCH_LOG,
            TreeType::Acacia => blocks::ACACIA_LOG,
            TreeType::DarkOak => blocks::DARK_OAK_LOG,
            TreeType::Jungle => blocks::JUNGLE_LOG,
            TreeType::BrownMushroom | TreeType::RedMushroom => blocks::MUSHROOM_STEM,
        }
    }

    /// Get leaves (or cap) block ID for this tree type.
    pub fn leaves_block(self) -> BlockId {
        match self {
            TreeType::Oak => blocks::LEAVES,
            TreeType::Birch => blocks::BIRCH_LEAVES,
            TreeType::Acacia => blocks::ACACIA_LEAVES,
            TreeType::DarkOak => blocks::DARK_OAK_LEAVES,
            TreeType::Jungle => blocks::JUNGLE_LEAVES,
            TreeType::BrownMushroom => blocks::BROWN_MUSHROOM_BLOCK,
            TreeType::RedMushroom => blocks::RED_MUSHROOM_BLOCK,
        }
    }

    /// Get trunk height for this tree type.
    pub fn trunk_height(self) -> i32 {
        match self {
            TreeType::Oak => 5,
            TreeType::Birch => 6,
            TreeType::Acacia => 5,
            TreeType::DarkOak => 6,
            TreeType::Jungle => 7,
            TreeType::BrownMushroom | TreeType::RedMushroom => 4,
        }
    }

    fn is_mushroom(self) -> bool {
        matches!(self, TreeType::BrownMushroom | TreeType::RedMushroom)
    }
}

/// Blocks making up a tree rooted at `base`, trunk first.
pub fn tree_blocks(base: BlockPos, tree: TreeType) -> Vec<(BlockPos, Voxel)> {
    let height = tree.trunk_height();
    let log = Voxel::new(tree.log_block());
    let leaves = Voxel::new(tree.leaves_block());

    let mut out: Vec<(BlockPos, Voxel)> = (0..height).map(|dy| (base.offset(0, dy, 0), log)).collect();

    if tree.is_mushroom() {
        // Flat 3x3 cap on top of the stem.
        for dx in -1..=1 {
            for dz in -1..=1 {
                out.push((base.offset(dx, height, dz), leaves));
            }
        }
        return out;
    }

    // Two wide layers around the upper trunk, then a narrow crown.
    for dy in (height - 2)..height {
        for dx in -2..=2i32 {
            for dz in -2..=2i32 {
                if (dx == 0 && dz == 0) || (dx.abs() == 2 && dz.abs() == 2) {
                    continue;
                }
                out.push((base.offset(dx, dy, dz), leaves));
            }
        }
    }
    for dx in -1..=1i32 {
        for dz in -1..=1i32 {
            if dx.abs() + dz.abs() <= 1 {
                out.push((base.offset(dx, height, dz), leaves));
            }
        }
    }
    out
}

/// Grow a tree at `base` if every block it needs is loaded and free.
///
/// The base block itself must already be cleared by the caller.
pub fn place_tree<T: Terrain + ?Sized>(terrain: &mut T, base: BlockPos, tree: TreeType) -> bool {
    let shape = tree_blocks(base, tree);

    let fits = shape.iter().all(|(pos, _)| {
        pos.y < CHUNK_SIZE_Y as i32 && matches!(terrain.block(*pos), Some(v) if v.is_air())
    });
    if !fits {
        return false;
    }

    for (pos, voxel) in shape {
        terrain.set_block(pos, voxel);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::VoxelTerrain;
    use crate::chunk::ChunkPos;

    #[test]
    fn tree_shape_starts_with_trunk() {
        let base = BlockPos::new(8, 64, 8);
        let shape = tree_blocks(base, TreeType::Birch);
        for dy in 0..TreeType::Birch.trunk_height() {
            assert_eq!(shape[dy as usize], (base.offset(0, dy, 0), Voxel::new(blocks::BIRCH_LOG)));
        }
        assert!(shape.iter().any(|(_, v)| v.id == blocks::BIRCH_LEAVES));
    }

    #[test]
    fn mushroom_has_cap() {
        let base = BlockPos::new(8, 64, 8);
        let shape = tree_blocks(base, TreeType::RedMushroom);
        let caps = shape
            .iter()
            .filter(|(_, v)| v.id == blocks::RED_MUSHROOM_BLOCK)
            .count();
        assert_eq!(caps, 9);
    }

    #[test]
    fn place_tree_needs_room() {
        let mut terrain = VoxelTerrain::new(16);
        terrain.load_chunk(ChunkPos::new(0, 0));
        let base = BlockPos::new(8, 64, 8);
        assert!(place_tree(&mut terrain, base, TreeType::Oak));
        assert_eq!(terrain.block(base), Some(Voxel::new(blocks::LOG)));

        // Second tree would overlap the first one.
        let next = BlockPos::new(9, 64, 8);
        assert!(!place_tree(&mut terrain, next, TreeType::Oak));
    }

    #[test]
    fn place_tree_fails_across_unloaded_chunk() {
        let mut terrain = VoxelTerrain::new(16);
        terrain.load_chunk(ChunkPos::new(0, 0));
        // Leaves would reach into chunk (-1, 0), which is not loaded.
        assert!(!place_tree(&mut terrain, BlockPos::new(0, 64, 8), TreeType::Oak));
        assert_eq!(terrain.block(BlockPos::new(0, 64, 8)), Some(Voxel::AIR));
    }
}
