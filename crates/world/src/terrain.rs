//! Host terrain access.
//!
//! The growth core never owns block data. It reads and writes blocks through
//! [`Terrain`], which a host engine implements for its world. [`VoxelTerrain`]
//! is an in-process implementation backed by voxel chunks with an LRU
//! residency limit, used by the driver binary and the tests.

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;

use lru::LruCache;

use crate::chunk::{BlockPos, Chunk, ChunkKey, ChunkPos, DirtyFlags, Voxel};
use crate::trees::{self, TreeType};

/// Visual/audio effect requested at a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// A crop finished growing.
    GrowthComplete,
    /// A sapling failed to grow into a tree.
    Smoke,
}

/// Block access into a host world.
pub trait Terrain {
    /// Block at `pos`, or `None` when the host chunk is not loaded.
    fn block(&self, pos: BlockPos) -> Option<Voxel>;

    /// Write a block; returns false when the host chunk is not loaded.
    fn set_block(&mut self, pos: BlockPos, voxel: Voxel) -> bool;

    /// Grow a tree rooted at `pos` (the sapling has already been cleared).
    fn grow_tree(&mut self, pos: BlockPos, tree: TreeType) -> bool;

    fn play_effect(&mut self, pos: BlockPos, effect: Effect);

    /// Chunks the host currently holds in memory.
    fn resident_chunks(&self) -> Vec<ChunkPos>;
}

/// In-memory chunked terrain with an LRU eviction policy.
/// Uses BTreeMap for deterministic iteration order.
pub struct VoxelTerrain {
    chunks: BTreeMap<ChunkKey, Chunk>,
    lru: LruCache<ChunkKey, ()>,
    capacity: usize,
    effects: Vec<(BlockPos, Effect)>,
}

impl VoxelTerrain {
    /// Create a terrain holding at most `capacity` chunks.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chunks: BTreeMap::new(),
            lru: LruCache::new(NonZeroUsize::MIN.saturating_add(capacity - 1)),
            capacity,
            effects: Vec::new(),
        }
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true when no chunks are currently stored.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn is_loaded(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos.key())
    }

    /// Load (or touch) a chunk. Returns the chunks evicted to make room, which
    /// the caller should report to the farm as deactivated.
    pub fn load_chunk(&mut self, pos: ChunkPos) -> Vec<ChunkPos> {
        let key = pos.key();
        let mut evicted = Vec::new();
        if !self.chunks.contains_key(&key) {
            while self.chunks.len() >= self.capacity {
                match self.lru.pop_lru() {
                    Some((oldest, _)) => {
                        self.chunks.remove(&oldest);
                        evicted.push(oldest.pos());
                    }
                    None => break,
                }
            }
            self.chunks.insert(key, Chunk::new(pos));
        }
        self.lru.put(key, ());
        evicted
    }

    /// Drop a chunk; returns false when it was not loaded.
    pub fn unload_chunk(&mut self, pos: ChunkPos) -> bool {
        let key = pos.key();
        self.lru.pop(&key);
        self.chunks.remove(&key).is_some()
    }

    /// Iterate over currently resident chunk positions.
    pub fn iter_positions(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.chunks.keys().map(|key| key.pos())
    }

    /// Effects played since the last call.
    pub fn take_effects(&mut self) -> Vec<(BlockPos, Effect)> {
        std::mem::take(&mut self.effects)
    }

    /// Chunks whose blocks changed since the last call.
    pub fn take_dirty_chunks(&mut self) -> BTreeSet<ChunkPos> {
        self.chunks
            .values_mut()
            .filter_map(|chunk| {
                chunk
                    .take_dirty_flags()
                    .contains(DirtyFlags::BLOCKS)
                    .then(|| chunk.position())
            })
            .collect()
    }
}

impl Terrain for VoxelTerrain {
    fn block(&self, pos: BlockPos) -> Option<Voxel> {
        if !pos.in_height_bounds() {
            return None;
        }
        let local = pos.local_key().local_pos();
        self.chunks
            .get(&pos.chunk().key())
            .map(|chunk| chunk.voxel(local.x, local.y, local.z))
    }

    fn set_block(&mut self, pos: BlockPos, voxel: Voxel) -> bool {
        if !pos.in_height_bounds() {
            return false;
        }
        let local = pos.local_key().local_pos();
        match self.chunks.get_mut(&pos.chunk().key()) {
            Some(chunk) => {
                chunk.set_voxel(local.x, local.y, local.z, voxel);
                true
            }
            None => false,
        }
    }

    fn grow_tree(&mut self, pos: BlockPos, tree: TreeType) -> bool {
        trees::place_tree(self, pos, tree)
    }

    fn play_effect(&mut self, pos: BlockPos, effect: Effect) {
        self.effects.push((pos, effect));
    }

    fn resident_chunks(&self) -> Vec<ChunkPos> {
        self.iter_positions().collect()
    }
}
