//! Crop records and the per-crop advance step.

use farmstead_core::Timestamp;
use serde::{Deserialize, Serialize};

use crate::blocks::{facing_of, with_facing};
use crate::chunk::{BlockPos, ChunkPos, LocalKey, Voxel};
use crate::growth::{GrowthResult, Stage};
use crate::kinds::{CropKind, CropRegistry};
use crate::scheduler::QueueSlot;
use crate::terrain::{Effect, Terrain};
use crate::world::WorldId;

/// Unique identity of one planted crop instance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CropId(pub u64);

/// Hands out fresh [`CropId`]s.
#[derive(Debug, Default)]
pub struct CropIdAllocator {
    next: u64,
}

impl CropIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> CropId {
        let id = CropId(self.next);
        self.next += 1;
        id
    }
}

/// Result of advancing a crop to the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Still in a growth stage; `next_due` is set.
    Growing,
    /// Reached its result stage.
    Done,
    /// The live block no longer belongs to any kind.
    KindMismatch,
    /// The owning chunk is not active; nothing was touched.
    ChunkInactive,
}

/// One planted crop. Kind is not stored: it is derived from the live block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropRecord {
    pub id: CropId,
    pub world: WorldId,
    pub chunk: ChunkPos,
    pub key: LocalKey,
    pub planted_at: Timestamp,
    /// When the crop next changes stage; `None` once finished or never computed.
    pub next_due: Option<Timestamp>,
    /// Scheduler queue holding this crop; `None` when unscheduled.
    pub slot: Option<QueueSlot>,
}

impl CropRecord {
    pub fn new(id: CropId, world: WorldId, pos: BlockPos, planted_at: Timestamp) -> Self {
        Self {
            id,
            world,
            chunk: pos.chunk(),
            key: pos.local_key(),
            planted_at,
            next_due: None,
            slot: None,
        }
    }

    /// World position of the crop.
    pub fn pos(&self) -> BlockPos {
        self.chunk.block(self.key)
    }

    pub fn is_scheduled(&self) -> bool {
        self.slot.is_some()
    }

    /// Bring the live block up to date with the time elapsed since planting.
    pub fn advance<T: Terrain + ?Sized>(
        &mut self,
        now: Timestamp,
        chunk_active: bool,
        terrain: &mut T,
        registry: &CropRegistry,
    ) -> AdvanceOutcome {
        if !chunk_active {
            return AdvanceOutcome::ChunkInactive;
        }

        let pos = self.pos();
        let Some(current) = terrain.block(pos) else {
            return AdvanceOutcome::ChunkInactive;
        };
        let Some(kind) = registry
            .kind_for_block(current)
            .and_then(|id| registry.get(id))
        else {
            return AdvanceOutcome::KindMismatch;
        };

        let elapsed = now.since(self.planted_at);
        match kind.table.stage_at(elapsed) {
            Stage::Growth { stage, .. } => {
                write_block(terrain, pos, kind, current, stage.voxel);
                self.next_due = Some(self.planted_at.plus(stage.time));
                AdvanceOutcome::Growing
            }
            Stage::Result(result) => {
                match *result {
                    GrowthResult::Block(voxel) => {
                        write_block(terrain, pos, kind, current, voxel);
                    }
                    GrowthResult::Tree(tree) => {
                        terrain.set_block(pos, Voxel::AIR);
                        if !terrain.grow_tree(pos, tree) {
                            terrain.set_block(pos, current);
                            terrain.play_effect(pos, Effect::Smoke);
                        }
                    }
                }
                self.next_due = None;
                terrain.play_effect(pos, Effect::GrowthComplete);
                AdvanceOutcome::Done
            }
        }
    }
}

fn write_block<T: Terrain + ?Sized>(
    terrain: &mut T,
    pos: BlockPos,
    kind: &CropKind,
    previous: Voxel,
    next: Voxel,
) {
    let next = if kind.directional {
        with_facing(next, facing_of(previous))
    } else {
        next
    };
    terrain.set_block(pos, next);
}
