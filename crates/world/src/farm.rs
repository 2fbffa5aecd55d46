//! The farm context: every world, the scheduler, storage and timers.
//!
//! Hosts create one [`Farm`] at startup, forward world events to it
//! (`add_crop`, `remove_crop`, `activate_chunk`, `deactivate_chunk`) and call
//! [`Farm::tick`] once per server tick.

use farmstead_core::{SimTick, Timestamp};
use tracing::{debug, error, info, warn};

use crate::chunk::{BlockPos, ChunkPos};
use crate::crop::{CropId, CropIdAllocator, CropRecord};
use crate::error::FarmError;
use crate::kinds::{CropKindId, CropRegistry};
use crate::scheduler::{Scheduler, SweepStats};
use crate::store::{CropStore, StoreError};
use crate::terrain::Terrain;
use crate::timer::{CropTimer, ObserverId, TimerBoard};
use crate::world::{FarmServices, FarmWorld, WorldId};

/// Ticks between unload sweeps by default (five minutes at 20 TPS).
pub const DEFAULT_UNLOAD_INTERVAL_TICKS: u64 = 6_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarmSettings {
    /// Run the passive-chunk unload sweep every this many ticks (0 disables it).
    pub unload_interval_ticks: u64,
}

impl Default for FarmSettings {
    fn default() -> Self {
        Self {
            unload_interval_ticks: DEFAULT_UNLOAD_INTERVAL_TICKS,
        }
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub chunks_unloaded: usize,
    pub sweep: SweepStats,
    pub timers_evicted: usize,
}

struct WorldSlot<T> {
    generation: u32,
    world: Option<FarmWorld<T>>,
}

/// Generational arena of loaded worlds.
struct WorldTable<T> {
    slots: Vec<WorldSlot<T>>,
    free: Vec<u32>,
}

impl<T: Terrain> WorldTable<T> {
    fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    fn insert(&mut self, name: &str, terrain: T) -> WorldId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(WorldSlot {
                    generation: 0,
                    world: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = WorldId::new(index, slot.generation);
        slot.world = Some(FarmWorld::new(id, name, terrain));
        id
    }

    fn remove(&mut self, id: WorldId) -> Option<FarmWorld<T>> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        let world = slot.world.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        Some(world)
    }

    fn get(&self, id: WorldId) -> Option<&FarmWorld<T>> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.world.as_ref()
    }

    fn get_mut(&mut self, id: WorldId) -> Option<&mut FarmWorld<T>> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation != id.generation() {
            return None;
        }
        slot.world.as_mut()
    }

    fn iter(&self) -> impl Iterator<Item = &FarmWorld<T>> {
        self.slots.iter().filter_map(|slot| slot.world.as_ref())
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut FarmWorld<T>> {
        self.slots.iter_mut().filter_map(|slot| slot.world.as_mut())
    }
}

pub struct Farm<T> {
    registry: CropRegistry,
    worlds: WorldTable<T>,
    scheduler: Scheduler,
    store: Box<dyn CropStore>,
    timers: TimerBoard,
    ids: CropIdAllocator,
    tick: SimTick,
    settings: FarmSettings,
}

impl<T: Terrain> Farm<T> {
    pub fn new(registry: CropRegistry, store: Box<dyn CropStore>, settings: FarmSettings) -> Self {
        Self {
            registry,
            worlds: WorldTable::new(),
            scheduler: Scheduler::new(),
            store,
            timers: TimerBoard::new(),
            ids: CropIdAllocator::new(),
            tick: SimTick::ZERO,
            settings,
        }
    }

    pub fn registry(&self) -> &CropRegistry {
        &self.registry
    }

    /// Mutable registry access, e.g. to apply configured durations.
    pub fn registry_mut(&mut self) -> &mut CropRegistry {
        &mut self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn timers(&self) -> &TimerBoard {
        &self.timers
    }

    pub fn current_tick(&self) -> SimTick {
        self.tick
    }

    /// Register a world and its terrain, then activate every chunk the
    /// terrain already holds.
    pub fn load_world(
        &mut self,
        name: &str,
        terrain: T,
        now: Timestamp,
    ) -> Result<WorldId, FarmError> {
        if self.world_by_name(name).is_ok() {
            return Err(FarmError::DuplicateWorld(name.to_string()));
        }
        if let Err(err) = self.store.save_world(name) {
            warn!(%err, world = name, "failed to register world with storage");
        }
        let resident = terrain.resident_chunks();
        let id = self.worlds.insert(name, terrain);

        let mut scheduled = 0;
        for pos in resident {
            scheduled += self.activate_chunk(id, pos, now)?;
        }
        info!(world = name, %id, scheduled, "loaded farm world");
        Ok(id)
    }

    /// Unschedule every crop of a world and drop it, handing back its terrain.
    pub fn unload_world(&mut self, id: WorldId) -> Result<T, FarmError> {
        let mut world = self.worlds.remove(id).ok_or(FarmError::StaleWorld(id))?;
        world.unload_all(&mut self.scheduler);
        let stale: Vec<ObserverId> = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.world == id)
            .map(|(observer, _)| observer)
            .collect();
        for observer in stale {
            self.timers.detach(observer);
        }
        info!(world = world.name(), %id, "unloaded farm world");
        Ok(world.into_terrain())
    }

    pub fn world(&self, id: WorldId) -> Result<&FarmWorld<T>, FarmError> {
        self.worlds.get(id).ok_or(FarmError::StaleWorld(id))
    }

    /// Terrain of a world, for host-side block edits.
    pub fn terrain_mut(&mut self, id: WorldId) -> Result<&mut T, FarmError> {
        Ok(self.world_mut(id)?.terrain_mut())
    }

    fn world_mut(&mut self, id: WorldId) -> Result<&mut FarmWorld<T>, FarmError> {
        self.worlds.get_mut(id).ok_or(FarmError::StaleWorld(id))
    }

    pub fn world_by_name(&self, name: &str) -> Result<WorldId, FarmError> {
        self.worlds
            .iter()
            .find(|world| world.name() == name)
            .map(FarmWorld::id)
            .ok_or_else(|| FarmError::UnknownWorld(name.to_string()))
    }

    pub fn worlds(&self) -> impl Iterator<Item = &FarmWorld<T>> {
        self.worlds.iter()
    }

    fn split(&mut self, id: WorldId) -> Result<(&mut FarmWorld<T>, FarmServices<'_>), FarmError> {
        let world = self.worlds.get_mut(id).ok_or(FarmError::StaleWorld(id))?;
        let services = FarmServices {
            registry: &self.registry,
            scheduler: &mut self.scheduler,
            store: &mut *self.store,
            ids: &mut self.ids,
        };
        Ok((world, services))
    }

    pub fn add_crop(
        &mut self,
        world: WorldId,
        pos: BlockPos,
        kind: CropKindId,
        now: Timestamp,
    ) -> Result<CropId, FarmError> {
        let (world, mut svc) = self.split(world)?;
        world.add_crop(pos, kind, now, &mut svc)
    }

    pub fn remove_crop(
        &mut self,
        world: WorldId,
        pos: BlockPos,
    ) -> Result<Option<CropRecord>, FarmError> {
        let (world, mut svc) = self.split(world)?;
        Ok(world.remove_crop(pos, &mut svc))
    }

    pub fn activate_chunk(
        &mut self,
        world: WorldId,
        pos: ChunkPos,
        now: Timestamp,
    ) -> Result<usize, FarmError> {
        let (world, mut svc) = self.split(world)?;
        Ok(world.activate_chunk(pos, now, &mut svc))
    }

    pub fn deactivate_chunk(&mut self, world: WorldId, pos: ChunkPos) -> Result<bool, FarmError> {
        let (world, mut svc) = self.split(world)?;
        Ok(world.deactivate_chunk(pos, &mut svc))
    }

    /// Load a chunk's crops without scheduling them.
    pub fn load_chunk(&mut self, world: WorldId, pos: ChunkPos) -> Result<usize, FarmError> {
        let (world, mut svc) = self.split(world)?;
        Ok(world.get_or_load(pos, &mut svc).len())
    }

    pub fn crop_at(&self, world: WorldId, pos: BlockPos) -> Result<Option<&CropRecord>, FarmError> {
        Ok(self.world(world)?.crop_at(pos))
    }

    /// Show `observer` a countdown for the crop at `pos`, replacing any timer
    /// it already had.
    pub fn add_timer(
        &mut self,
        observer: ObserverId,
        world: WorldId,
        pos: BlockPos,
        now: Timestamp,
    ) -> Result<(), FarmError> {
        let farm_world = self.world(world)?;
        let record = farm_world.crop_at(pos).ok_or(FarmError::NoCrop(pos))?;
        let timer = CropTimer::new(world, pos, record.id);
        let remaining =
            remaining_for(farm_world, &self.registry, &timer, now).ok_or(FarmError::NoCrop(pos))?;
        self.timers.attach(observer, timer, remaining);
        Ok(())
    }

    pub fn remove_timer(&mut self, observer: ObserverId) -> bool {
        self.timers.detach(observer).is_some()
    }

    /// Run one tick: periodic unload sweep, growth sweep, storage commit, timers.
    pub fn tick(&mut self, now: Timestamp) -> TickReport {
        self.tick = self.tick.advance(1);

        let mut chunks_unloaded = 0;
        if self.tick.is_every(self.settings.unload_interval_ticks) {
            for world in self.worlds.iter_mut() {
                chunks_unloaded += world.unload_chunks(&mut self.scheduler);
            }
        }

        let Self {
            registry,
            worlds,
            scheduler,
            store,
            timers,
            ..
        } = self;

        let sweep = scheduler.sweep(now, |_, entry| match worlds.get_mut(entry.world) {
            Some(world) => world.advance_scheduled(entry, now, registry, &mut **store),
            None => {
                error!(world = %entry.world, id = entry.id.0, "scheduled crop in unloaded world");
                debug_assert!(false, "scheduled crop in unloaded world");
                None
            }
        });

        if let Err(err) = store.commit() {
            warn!(%err, "failed to commit crop store");
        }

        let evicted = timers.refresh(|timer| {
            worlds
                .get(timer.world)
                .and_then(|world| remaining_for(world, registry, timer, now))
        });

        if sweep.rescheduled + sweep.dropped > 0 {
            debug!(
                tick = self.tick.0,
                rescheduled = sweep.rescheduled,
                dropped = sweep.dropped,
                "growth sweep"
            );
        }

        TickReport {
            tick: self.tick.0,
            chunks_unloaded,
            sweep,
            timers_evicted: evicted.len(),
        }
    }

    /// Drop every world and timer, then close the store.
    pub fn shutdown(mut self) -> Result<(), StoreError> {
        for world in self.worlds.iter_mut() {
            world.unload_all(&mut self.scheduler);
        }
        self.timers.clear();
        debug_assert!(self.scheduler.is_empty());
        info!(tick = self.tick.0, "farm shut down");
        self.store.close()
    }
}

/// Time left for a timer's crop, or `None` when the timer no longer applies.
fn remaining_for<T: Terrain>(
    world: &FarmWorld<T>,
    registry: &CropRegistry,
    timer: &CropTimer,
    now: Timestamp,
) -> Option<u64> {
    let record = world
        .crop_at(timer.pos)
        .filter(|record| record.id == timer.crop && record.is_scheduled())?;
    if !world.chunk_at(record.chunk)?.is_active() {
        return None;
    }
    let voxel = world.terrain().block(timer.pos)?;
    let kind = registry.kind_for_block(voxel).and_then(|id| registry.get(id))?;
    Some(record.planted_at.plus(kind.table.duration()).since(now))
}
