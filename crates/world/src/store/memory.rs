use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use farmstead_core::Timestamp;

use super::{CropRow, CropStore, StoreError};
use crate::chunk::{BlockPos, ChunkPos};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Live(Timestamp),
    Deleted,
}

#[derive(Debug, Default)]
struct Inner {
    worlds: BTreeSet<String>,
    committed: BTreeMap<(String, BlockPos), Slot>,
    pending: BTreeMap<(String, BlockPos), Slot>,
    failing: bool,
    commits: usize,
}

impl Inner {
    fn check(&self, op: &'static str) -> Result<(), StoreError> {
        if self.failing {
            Err(StoreError::Injected(op))
        } else {
            Ok(())
        }
    }

    fn check_world(&self, world: &str) -> Result<(), StoreError> {
        if self.worlds.contains(world) {
            Ok(())
        } else {
            Err(StoreError::UnknownWorld(world.to_string()))
        }
    }
}

/// In-memory store with pending and committed layers.
///
/// Clones share the same data so a test can keep a handle after giving the
/// store to a farm.
#[derive(Debug, Clone, Default)]
pub struct MemoryCropStore {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryCropStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with [`StoreError::Injected`] until switched off.
    pub fn set_failing(&self, failing: bool) {
        self.inner.borrow_mut().failing = failing;
    }

    /// Live committed rows of a world, ordered by position.
    pub fn committed_rows(&self, world: &str) -> Vec<CropRow> {
        self.inner
            .borrow()
            .committed
            .iter()
            .filter(|((name, _), _)| name == world)
            .filter_map(|((_, pos), slot)| match slot {
                Slot::Live(planted_at) => Some(CropRow {
                    pos: *pos,
                    planted_at: *planted_at,
                }),
                Slot::Deleted => None,
            })
            .collect()
    }

    /// Committed rows including soft-deleted ones.
    pub fn committed_len(&self) -> usize {
        self.inner.borrow().committed.len()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Successful commits so far.
    pub fn commits(&self) -> usize {
        self.inner.borrow().commits
    }
}

impl CropStore for MemoryCropStore {
    fn save_world(&mut self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.check("save_world")?;
        inner.worlds.insert(name.to_string());
        Ok(())
    }

    fn save_crop(&mut self, world: &str, row: CropRow) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.check("save_crop")?;
        inner.check_world(world)?;
        inner
            .pending
            .insert((world.to_string(), row.pos), Slot::Live(row.planted_at));
        Ok(())
    }

    fn delete_crop(&mut self, world: &str, pos: BlockPos) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.check("delete_crop")?;
        inner.check_world(world)?;
        inner.pending.insert((world.to_string(), pos), Slot::Deleted);
        Ok(())
    }

    fn load_chunk(&mut self, world: &str, chunk: ChunkPos) -> Result<Vec<CropRow>, StoreError> {
        let inner = self.inner.borrow();
        inner.check("load_chunk")?;
        inner.check_world(world)?;

        let mut view: BTreeMap<BlockPos, Slot> = BTreeMap::new();
        for layer in [&inner.committed, &inner.pending] {
            for ((name, pos), slot) in layer {
                if name == world && chunk.contains_column(pos.x, pos.z) {
                    view.insert(*pos, *slot);
                }
            }
        }

        Ok(view
            .into_iter()
            .filter_map(|(pos, slot)| match slot {
                Slot::Live(planted_at) => Some(CropRow { pos, planted_at }),
                Slot::Deleted => None,
            })
            .collect())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        inner.check("commit")?;
        let pending = std::mem::take(&mut inner.pending);
        inner.committed.extend(pending);
        inner.commits += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.commit()?;
        self.inner
            .borrow_mut()
            .committed
            .retain(|_, slot| matches!(slot, Slot::Live(_)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(x: i32, y: i32, z: i32, planted: u64) -> CropRow {
        CropRow {
            pos: BlockPos::new(x, y, z),
            planted_at: Timestamp(planted),
        }
    }

    #[test]
    fn rows_become_durable_on_commit() {
        let mut store = MemoryCropStore::new();
        store.save_world("farm").unwrap();
        store.save_crop("farm", row(1, 64, 1, 10)).unwrap();
        assert!(store.committed_rows("farm").is_empty());
        // Uncommitted rows are still visible to loads.
        assert_eq!(
            store.load_chunk("farm", ChunkPos::new(0, 0)).unwrap(),
            vec![row(1, 64, 1, 10)]
        );
        store.commit().unwrap();
        assert_eq!(store.committed_rows("farm"), vec![row(1, 64, 1, 10)]);
    }

    #[test]
    fn load_is_limited_to_the_column() {
        let mut store = MemoryCropStore::new();
        store.save_world("farm").unwrap();
        store.save_crop("farm", row(15, 64, 15, 1)).unwrap();
        store.save_crop("farm", row(16, 64, 0, 2)).unwrap();
        store.save_crop("farm", row(-1, 64, 0, 3)).unwrap();
        let rows = store.load_chunk("farm", ChunkPos::new(0, 0)).unwrap();
        assert_eq!(rows, vec![row(15, 64, 15, 1)]);
        let rows = store.load_chunk("farm", ChunkPos::new(-1, 0)).unwrap();
        assert_eq!(rows, vec![row(-1, 64, 0, 3)]);
    }

    #[test]
    fn deletes_are_soft_until_close() {
        let mut store = MemoryCropStore::new();
        store.save_world("farm").unwrap();
        store.save_crop("farm", row(1, 64, 1, 10)).unwrap();
        store.commit().unwrap();
        store.delete_crop("farm", BlockPos::new(1, 64, 1)).unwrap();
        store.commit().unwrap();
        assert!(store.committed_rows("farm").is_empty());
        assert_eq!(store.committed_len(), 1);
        store.close().unwrap();
        assert_eq!(store.committed_len(), 0);
    }

    #[test]
    fn unknown_world_is_rejected() {
        let mut store = MemoryCropStore::new();
        let err = store.save_crop("nowhere", row(0, 0, 0, 0)).unwrap_err();
        assert!(matches!(err, StoreError::UnknownWorld(name) if name == "nowhere"));
    }

    #[test]
    fn injected_failures_surface() {
        let mut store = MemoryCropStore::new();
        let handle = store.clone();
        handle.set_failing(true);
        assert!(matches!(
            store.save_world("farm"),
            Err(StoreError::Injected("save_world"))
        ));
        handle.set_failing(false);
        store.save_world("farm").unwrap();
    }
}
