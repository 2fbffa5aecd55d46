//! Property-based tests for crop chunk indexing
//!
//! Critical invariants:
//! - Records stay sorted by local key with no duplicates
//! - Lookups agree with a reference map after any insert/remove sequence
//! - Scheduler registration and removal keep its size consistent

use std::collections::BTreeMap;

use farmstead_core::Timestamp;
use farmstead_world::{
    ChunkPos, CropChunk, CropId, CropRecord, LocalKey, ScheduledCrop, Scheduler, WorldId,
};
use proptest::prelude::*;

const CHUNK: ChunkPos = ChunkPos::new(-3, 7);

#[derive(Debug, Clone)]
enum Op {
    Insert { x: i32, y: i32, z: i32 },
    Remove { x: i32, y: i32, z: i32 },
}

fn op() -> impl Strategy<Value = Op> {
    let coords = (0i32..16, 0i32..256, 0i32..16);
    prop_oneof![
        coords.clone().prop_map(|(x, y, z)| Op::Insert { x, y, z }),
        coords.prop_map(|(x, y, z)| Op::Remove { x, y, z }),
    ]
}

fn record(id: u64, x: i32, y: i32, z: i32) -> CropRecord {
    let pos = CHUNK.block(LocalKey::new(x, y, z));
    CropRecord::new(CropId(id), WorldId::new(0, 0), pos, Timestamp(id))
}

proptest! {
    /// Property: records stay strictly ordered by key and mirror a BTreeMap.
    #[test]
    fn crop_chunk_matches_reference_map(ops in prop::collection::vec(op(), 1..200)) {
        let mut chunk = CropChunk::new(WorldId::new(0, 0), CHUNK);
        let mut reference: BTreeMap<LocalKey, CropId> = BTreeMap::new();

        for (id, op) in ops.into_iter().enumerate() {
            let id = id as u64;
            match op {
                Op::Insert { x, y, z } => {
                    let key = LocalKey::new(x, y, z);
                    let displaced = chunk.insert(record(id, x, y, z));
                    let expected = reference.insert(key, CropId(id));
                    prop_assert_eq!(displaced.map(|r| r.id), expected);
                }
                Op::Remove { x, y, z } => {
                    let key = LocalKey::new(x, y, z);
                    let removed = chunk.remove_at(x, y, z);
                    prop_assert_eq!(removed.map(|r| r.id), reference.remove(&key));
                }
            }

            let keys: Vec<LocalKey> = chunk.records().iter().map(|r| r.key).collect();
            prop_assert!(keys.windows(2).all(|pair| pair[0] < pair[1]), "unsorted keys");
            prop_assert_eq!(chunk.len(), reference.len());
            prop_assert!(chunk.capacity() >= chunk.len());
        }

        for (key, id) in &reference {
            let found = chunk.get_key(*key).map(|r| r.id);
            prop_assert_eq!(found, Some(*id));
            let record = chunk.get_key(*key).unwrap();
            prop_assert_eq!(record.pos().chunk(), CHUNK);
        }
    }

    /// Property: a local key always maps back to the same block position.
    #[test]
    fn local_keys_roundtrip_through_block_pos(x in 0i32..16, y in 0i32..256, z in 0i32..16) {
        let key = LocalKey::new(x, y, z);
        let pos = CHUNK.block(key);
        prop_assert_eq!(pos.chunk(), CHUNK);
        prop_assert_eq!(pos.local_key(), key);
        prop_assert_eq!((key.x(), key.y(), key.z()), (x, y, z));
    }

    /// Property: unregistering every registered entry empties the scheduler.
    #[test]
    fn scheduler_size_tracks_registrations(dues in prop::collection::vec(0u64..10_000, 1..400)) {
        let mut scheduler = Scheduler::new();
        let mut slots = Vec::new();
        for (id, due) in dues.iter().enumerate() {
            let entry = ScheduledCrop {
                due: Timestamp(*due),
                id: CropId(id as u64),
                world: WorldId::new(0, 0),
                chunk: CHUNK,
                key: LocalKey(id as u16),
            };
            slots.push((scheduler.register(entry), entry));
        }
        prop_assert_eq!(scheduler.len(), dues.len());

        for (slot, entry) in &slots {
            prop_assert!(scheduler.unregister(*slot, entry));
            prop_assert!(!scheduler.unregister(*slot, entry));
        }
        prop_assert!(scheduler.is_empty());
    }
}
