//! Per-world crop index and chunk lifecycle.
//!
//! A [`FarmWorld`] maps packed chunk keys to [`CropChunk`]s. Chunks are either
//! active (the host chunk is live and their crops are scheduled) or passive
//! (loaded for data access only and queued for the next unload sweep).

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use farmstead_core::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::chunk::{BlockPos, ChunkKey, ChunkPos};
use crate::crop::{AdvanceOutcome, CropId, CropIdAllocator, CropRecord};
use crate::crop_chunk::CropChunk;
use crate::error::FarmError;
use crate::kinds::{CropKindId, CropRegistry};
use crate::scheduler::{QueueSlot, ScheduledCrop, Scheduler};
use crate::store::{CropRow, CropStore};
use crate::terrain::Terrain;

/// Generational handle to a loaded world.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct WorldId {
    index: u32,
    generation: u32,
}

impl WorldId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

/// Shared services a world borrows from its farm for one operation.
pub struct FarmServices<'a> {
    pub registry: &'a CropRegistry,
    pub scheduler: &'a mut Scheduler,
    pub store: &'a mut dyn CropStore,
    pub ids: &'a mut CropIdAllocator,
}

/// Crops of one world plus the host terrain they grow in.
pub struct FarmWorld<T> {
    id: WorldId,
    name: String,
    terrain: T,
    chunks: BTreeMap<ChunkKey, CropChunk>,
    unload_queue: BTreeSet<ChunkKey>,
}

impl<T: Terrain> FarmWorld<T> {
    pub fn new(id: WorldId, name: impl Into<String>, terrain: T) -> Self {
        Self {
            id,
            name: name.into(),
            terrain,
            chunks: BTreeMap::new(),
            unload_queue: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn terrain(&self) -> &T {
        &self.terrain
    }

    pub fn terrain_mut(&mut self) -> &mut T {
        &mut self.terrain
    }

    pub fn into_terrain(self) -> T {
        self.terrain
    }

    /// Chunk holding `pos`, if loaded.
    pub fn chunk_at(&self, pos: ChunkPos) -> Option<&CropChunk> {
        self.chunks.get(&pos.key())
    }

    pub fn loaded_chunks(&self) -> impl Iterator<Item = &CropChunk> {
        self.chunks.values()
    }

    /// Chunks waiting for the next unload sweep.
    pub fn pending_unloads(&self) -> impl Iterator<Item = ChunkPos> + '_ {
        self.unload_queue.iter().map(|key| key.pos())
    }

    pub fn crop_at(&self, pos: BlockPos) -> Option<&CropRecord> {
        self.chunks.get(&pos.chunk().key())?.get_key(pos.local_key())
    }

    /// Total crops across loaded chunks.
    pub fn crop_count(&self) -> usize {
        self.chunks.values().map(CropChunk::len).sum()
    }

    /// Return the chunk, loading it from storage as a passive chunk if absent.
    pub fn get_or_load(&mut self, pos: ChunkPos, svc: &mut FarmServices<'_>) -> &mut CropChunk {
        let key = pos.key();
        match self.chunks.entry(key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let mut chunk = CropChunk::new(self.id, pos);
                for row in load_rows(svc.store, &self.name, pos) {
                    if !row.pos.in_height_bounds() || row.pos.chunk() != pos {
                        warn!(world = %self.name, pos = %row.pos, chunk = %pos, "skipping stored crop outside its chunk");
                        continue;
                    }
                    chunk.insert(CropRecord::new(
                        svc.ids.allocate(),
                        self.id,
                        row.pos,
                        row.planted_at,
                    ));
                }
                self.unload_queue.insert(key);
                debug!(world = %self.name, chunk = %pos, crops = chunk.len(), "loaded crop chunk");
                entry.insert(chunk)
            }
        }
    }

    /// Mark a chunk active and schedule its crops.
    ///
    /// Crops that finished or whose block changed while the chunk was away are
    /// dropped from the index and from storage. Returns the number of crops
    /// newly scheduled; activating an active chunk does nothing.
    pub fn activate_chunk(
        &mut self,
        pos: ChunkPos,
        now: Timestamp,
        svc: &mut FarmServices<'_>,
    ) -> usize {
        if self.chunk_at(pos).is_some_and(CropChunk::is_active) {
            return 0;
        }
        self.get_or_load(pos, svc);

        let key = pos.key();
        self.unload_queue.remove(&key);
        let Some(chunk) = self.chunks.get_mut(&key) else {
            return 0;
        };
        chunk.set_active(true);

        let mut scheduled = 0;
        let mut finished = Vec::new();
        for record in chunk.records_mut() {
            if record.is_scheduled() {
                continue;
            }
            match record.advance(now, true, &mut self.terrain, svc.registry) {
                AdvanceOutcome::Growing => {
                    schedule(svc.scheduler, record);
                    scheduled += 1;
                }
                AdvanceOutcome::Done | AdvanceOutcome::KindMismatch => finished.push(record.key),
                AdvanceOutcome::ChunkInactive => {
                    warn!(world = %self.name, pos = %record.pos(), "host chunk missing during activation, crop left unscheduled");
                }
            }
        }

        for key in finished {
            if let Some(record) = chunk.remove_key(key) {
                delete_row(svc.store, &self.name, record.pos());
            }
        }

        debug!(world = %self.name, chunk = %pos, scheduled, "activated crop chunk");
        scheduled
    }

    /// Mark a chunk passive and unschedule its crops. Records stay in the
    /// chunk until the next unload sweep.
    pub fn deactivate_chunk(&mut self, pos: ChunkPos, svc: &mut FarmServices<'_>) -> bool {
        let key = pos.key();
        let Some(chunk) = self.chunks.get_mut(&key) else {
            return false;
        };
        if !chunk.is_active() {
            return false;
        }
        chunk.set_active(false);
        for record in chunk.records_mut() {
            unschedule(svc.scheduler, record);
        }
        self.unload_queue.insert(key);
        debug!(world = %self.name, chunk = %pos, "deactivated crop chunk");
        true
    }

    /// Drop every chunk queued for unload. Returns how many were dropped.
    pub fn unload_chunks(&mut self, scheduler: &mut Scheduler) -> usize {
        let queued = std::mem::take(&mut self.unload_queue);
        let mut unloaded = 0;
        for key in queued {
            let Some(chunk) = self.chunks.remove(&key) else {
                continue;
            };
            for mut record in chunk.destroy() {
                unschedule(scheduler, &mut record);
            }
            unloaded += 1;
        }
        if unloaded > 0 {
            debug!(world = %self.name, unloaded, "unloaded passive crop chunks");
        }
        unloaded
    }

    /// Unschedule every crop and drop all chunks.
    pub fn unload_all(&mut self, scheduler: &mut Scheduler) {
        for (_, chunk) in std::mem::take(&mut self.chunks) {
            for mut record in chunk.destroy() {
                unschedule(scheduler, &mut record);
            }
        }
        self.unload_queue.clear();
    }

    /// Plant a crop of `kind` at `pos`. The host has already placed the block.
    pub fn add_crop(
        &mut self,
        pos: BlockPos,
        kind: CropKindId,
        now: Timestamp,
        svc: &mut FarmServices<'_>,
    ) -> Result<CropId, FarmError> {
        if !pos.in_height_bounds() {
            return Err(FarmError::OutOfBounds { y: pos.y });
        }
        let first = svc
            .registry
            .get(kind)
            .ok_or(FarmError::UnknownKind(kind))?
            .table
            .first_stage()
            .time;

        let id = svc.ids.allocate();
        let mut record = CropRecord::new(id, self.id, pos, now);
        record.next_due = Some(now.plus(first));

        let chunk = self.get_or_load(pos.chunk(), svc);
        let active = chunk.is_active();
        if active {
            schedule(svc.scheduler, &mut record);
        }
        if let Some(mut displaced) = chunk.insert(record) {
            unschedule(svc.scheduler, &mut displaced);
        }

        save_row(
            svc.store,
            &self.name,
            CropRow {
                pos,
                planted_at: now,
            },
        );
        Ok(id)
    }

    /// Remove the crop at `pos` from the index and from storage.
    pub fn remove_crop(&mut self, pos: BlockPos, svc: &mut FarmServices<'_>) -> Option<CropRecord> {
        let removed = self
            .chunks
            .get_mut(&pos.chunk().key())
            .and_then(|chunk| chunk.remove_key(pos.local_key()))
            .map(|mut record| {
                unschedule(svc.scheduler, &mut record);
                record
            });
        delete_row(svc.store, &self.name, pos);
        removed
    }

    /// Advance one crop pulled from the scheduler.
    ///
    /// Returns the next due time when the crop stays scheduled.
    pub(crate) fn advance_scheduled(
        &mut self,
        entry: &ScheduledCrop,
        now: Timestamp,
        registry: &CropRegistry,
        store: &mut dyn CropStore,
    ) -> Option<Timestamp> {
        let Some(chunk) = self.chunks.get_mut(&entry.chunk.key()) else {
            error!(world = %self.name, chunk = %entry.chunk, "scheduled crop has no chunk");
            debug_assert!(false, "scheduled crop has no chunk");
            return None;
        };
        let active = chunk.is_active();
        let Some(record) = chunk
            .get_key_mut(entry.key)
            .filter(|record| record.id == entry.id)
        else {
            error!(world = %self.name, chunk = %entry.chunk, id = entry.id.0, "scheduled crop has no record");
            debug_assert!(false, "scheduled crop has no record");
            return None;
        };

        match record.advance(now, active, &mut self.terrain, registry) {
            AdvanceOutcome::Growing => record.next_due,
            AdvanceOutcome::ChunkInactive => {
                if active {
                    error!(world = %self.name, pos = %record.pos(), "host terrain missing for an active chunk");
                } else {
                    error!(world = %self.name, pos = %record.pos(), "scheduled crop in inactive chunk");
                    debug_assert!(false, "scheduled crop in inactive chunk");
                }
                record.slot = None;
                None
            }
            AdvanceOutcome::Done | AdvanceOutcome::KindMismatch => {
                record.slot = None;
                let pos = record.pos();
                chunk.remove_key(entry.key);
                delete_row(store, &self.name, pos);
                None
            }
        }
    }
}

fn schedule(scheduler: &mut Scheduler, record: &mut CropRecord) {
    let Some(due) = record.next_due else {
        error!(id = record.id.0, pos = %record.pos(), "cannot schedule a crop without a due time");
        return;
    };
    record.slot = Some(scheduler.register(entry_for(record, due)));
}

fn unschedule(scheduler: &mut Scheduler, record: &mut CropRecord) {
    let (Some(slot), Some(due)) = (record.slot.take(), record.next_due) else {
        return;
    };
    if !scheduler.unregister(slot, &entry_for(record, due)) {
        unschedule_failed(record, slot);
    }
}

fn unschedule_failed(record: &CropRecord, slot: QueueSlot) {
    error!(id = record.id.0, pos = %record.pos(), slot = slot.0, "crop missing from its queue");
    debug_assert!(false, "crop missing from its queue");
}

fn entry_for(record: &CropRecord, due: Timestamp) -> ScheduledCrop {
    ScheduledCrop {
        due,
        id: record.id,
        world: record.world,
        chunk: record.chunk,
        key: record.key,
    }
}

fn load_rows(store: &mut dyn CropStore, world: &str, chunk: ChunkPos) -> Vec<CropRow> {
    store.load_chunk(world, chunk).unwrap_or_else(|err| {
        warn!(%err, world, %chunk, "failed to load crops");
        Vec::new()
    })
}

fn save_row(store: &mut dyn CropStore, world: &str, row: CropRow) {
    if let Err(err) = store.save_crop(world, row) {
        warn!(%err, world, pos = %row.pos, "failed to save crop");
    }
}

fn delete_row(store: &mut dyn CropStore, world: &str, pos: BlockPos) {
    if let Err(err) = store.delete_crop(world, pos) {
        warn!(%err, world, %pos, "failed to delete crop");
    }
}
