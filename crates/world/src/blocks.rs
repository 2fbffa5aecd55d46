//! Block ids used by the growth core and the voxel terrain.
//!
//! Ageable blocks keep their age in the low four state bits; directional
//! blocks keep their facing in bits 4-5.

use crate::chunk::{BlockId, BlockState, Voxel};

pub const STONE: BlockId = 1;
pub const DIRT: BlockId = 2;
pub const LOG: BlockId = 11;
pub const LEAVES: BlockId = 12;
pub const BIRCH_LOG: BlockId = 13;
pub const BIRCH_LEAVES: BlockId = 14;
pub const ACACIA_LOG: BlockId = 20;
pub const ACACIA_LEAVES: BlockId = 21;
pub const DARK_OAK_LOG: BlockId = 22;
pub const DARK_OAK_LEAVES: BlockId = 23;
pub const JUNGLE_LOG: BlockId = 24;
pub const JUNGLE_LEAVES: BlockId = 25;
pub const MUSHROOM_STEM: BlockId = 26;
pub const BROWN_MUSHROOM_BLOCK: BlockId = 27;
pub const RED_MUSHROOM_BLOCK: BlockId = 28;

pub const WHEAT: BlockId = 49;
pub const CARROTS: BlockId = 57;
pub const POTATOES: BlockId = 61;
pub const BEETROOTS: BlockId = 65;
pub const COCOA: BlockId = 66;
pub const NETHER_WART: BlockId = 67;
pub const SWEET_BERRY_BUSH: BlockId = 68;
pub const MELON_STEM: BlockId = 69;
pub const PUMPKIN_STEM: BlockId = 70;
pub const MELON: BlockId = 71;
pub const PUMPKIN: BlockId = 72;

pub const OAK_SAPLING: BlockId = 80;
pub const BIRCH_SAPLING: BlockId = 81;
pub const ACACIA_SAPLING: BlockId = 82;
pub const DARK_OAK_SAPLING: BlockId = 83;
pub const JUNGLE_SAPLING: BlockId = 84;
pub const BROWN_MUSHROOM: BlockId = 85;
pub const RED_MUSHROOM: BlockId = 86;

pub const AGE_MASK: BlockState = 0x000F;
pub const FACING_MASK: BlockState = 0x0030;
const FACING_SHIFT: u16 = 4;

/// Horizontal facing stored on directional blocks such as cocoa pods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facing {
    North,
    East,
    South,
    West,
}

impl Facing {
    const fn bits(self) -> BlockState {
        (match self {
            Facing::North => 0,
            Facing::East => 1,
            Facing::South => 2,
            Facing::West => 3,
        }) << FACING_SHIFT
    }

    const fn from_bits(state: BlockState) -> Self {
        match (state & FACING_MASK) >> FACING_SHIFT {
            0 => Facing::North,
            1 => Facing::East,
            2 => Facing::South,
            _ => Facing::West,
        }
    }
}

/// Voxel for an ageable block at `age`.
pub const fn aged(id: BlockId, age: u8) -> Voxel {
    Voxel::with_state(id, age as BlockState & AGE_MASK)
}

/// Age stored on an ageable block.
pub const fn age_of(voxel: Voxel) -> u8 {
    (voxel.state & AGE_MASK) as u8
}

pub const fn facing_of(voxel: Voxel) -> Facing {
    Facing::from_bits(voxel.state)
}

pub const fn with_facing(voxel: Voxel, facing: Facing) -> Voxel {
    Voxel::with_state(voxel.id, (voxel.state & !FACING_MASK) | facing.bits())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_and_facing_live_in_separate_bits() {
        let pod = with_facing(aged(COCOA, 2), Facing::West);
        assert_eq!(age_of(pod), 2);
        assert_eq!(facing_of(pod), Facing::West);

        let regrown = with_facing(aged(COCOA, 0), facing_of(pod));
        assert_eq!(age_of(regrown), 0);
        assert_eq!(facing_of(regrown), Facing::West);
    }

    #[test]
    fn age_is_masked() {
        assert_eq!(age_of(aged(WHEAT, 0x1F)), 0xF);
        assert_eq!(facing_of(aged(WHEAT, 7)), Facing::North);
    }
}
