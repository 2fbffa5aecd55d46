//! Per-chunk crop index.
//!
//! Records are kept in a vector sorted by [`LocalKey`] with no duplicates,
//! so lookups, inserts and removals are binary searches.

use crate::chunk::{ChunkPos, LocalKey};
use crate::crop::CropRecord;
use crate::world::WorldId;

/// Capacity reserved for a fresh chunk.
pub const DEFAULT_CAPACITY: usize = 0xFF;
/// Hard ceiling on records per chunk.
pub const MAX_CAPACITY: usize = 0xFFFF;

/// Crops inside one 16x16x256 column.
#[derive(Debug)]
pub struct CropChunk {
    world: WorldId,
    pos: ChunkPos,
    active: bool,
    records: Vec<CropRecord>,
}

impl CropChunk {
    pub fn new(world: WorldId, pos: ChunkPos) -> Self {
        Self {
            world,
            pos,
            active: false,
            records: Vec::with_capacity(DEFAULT_CAPACITY),
        }
    }

    pub fn world(&self) -> WorldId {
        self.world
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    /// Active chunks have a live host chunk and scheduled crops.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.records.capacity()
    }

    /// Records in ascending key order.
    pub fn records(&self) -> &[CropRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [CropRecord] {
        &mut self.records
    }

    fn search(&self, key: LocalKey) -> Result<usize, usize> {
        self.records.binary_search_by_key(&key, |record| record.key)
    }

    /// Insert a record, replacing and returning any record at the same key.
    ///
    /// # Panics
    /// Panics when the chunk already holds [`MAX_CAPACITY`] records.
    pub fn insert(&mut self, record: CropRecord) -> Option<CropRecord> {
        debug_assert_eq!(record.chunk, self.pos);
        match self.search(record.key) {
            Ok(index) => Some(std::mem::replace(&mut self.records[index], record)),
            Err(index) => {
                assert!(
                    self.records.len() < MAX_CAPACITY,
                    "crop chunk {} overflow",
                    self.pos
                );
                if self.records.len() == self.records.capacity() {
                    let target = (self.records.capacity().max(1) * 2).min(MAX_CAPACITY);
                    self.records.reserve_exact(target - self.records.len());
                }
                self.records.insert(index, record);
                None
            }
        }
    }

    /// Remove exactly this record.
    ///
    /// # Panics
    /// Panics when no record sits at its key or the one there is a different crop.
    pub fn remove_record(&mut self, record: &CropRecord) -> CropRecord {
        let index = match self.search(record.key) {
            Ok(index) => index,
            Err(_) => panic!("unregistered crop {} in chunk {}", record.pos(), self.pos),
        };
        assert_eq!(
            self.records[index].id,
            record.id,
            "crop mismatch at {} in chunk {}",
            record.pos(),
            self.pos
        );
        self.records.remove(index)
    }

    /// Remove whatever record sits at the given coordinates.
    pub fn remove_at(&mut self, x: i32, y: i32, z: i32) -> Option<CropRecord> {
        self.remove_key(LocalKey::new(x, y, z))
    }

    pub fn remove_key(&mut self, key: LocalKey) -> Option<CropRecord> {
        self.search(key).ok().map(|index| self.records.remove(index))
    }

    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<&CropRecord> {
        self.get_key(LocalKey::new(x, y, z))
    }

    pub fn get_mut(&mut self, x: i32, y: i32, z: i32) -> Option<&mut CropRecord> {
        self.get_key_mut(LocalKey::new(x, y, z))
    }

    pub fn get_key(&self, key: LocalKey) -> Option<&CropRecord> {
        self.search(key).ok().map(|index| &self.records[index])
    }

    pub fn get_key_mut(&mut self, key: LocalKey) -> Option<&mut CropRecord> {
        match self.search(key) {
            Ok(index) => Some(&mut self.records[index]),
            Err(_) => None,
        }
    }

    /// Tear the chunk down, handing back its records.
    pub fn destroy(self) -> Vec<CropRecord> {
        self.records
    }
}
