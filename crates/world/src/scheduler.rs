//! Bucketed growth scheduler.
//!
//! Scheduled crops are spread over several ready queues, each ordered by due
//! time. New entries go to the least loaded queue. Every tick a fractional
//! cursor moves over the queues and only the queues it crosses are drained,
//! so the per-tick cost stays bounded as the population grows. The number of
//! queues follows `ceil(sqrt(size + 1) / 4)` and never shrinks.

use std::collections::BTreeSet;

use farmstead_core::Timestamp;
use tracing::debug;

use crate::chunk::{ChunkPos, LocalKey};
use crate::crop::CropId;
use crate::world::WorldId;

/// Index of a ready queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueSlot(pub u32);

/// Non-owning scheduler entry pointing back at a crop record.
///
/// Ordered by due time, then crop id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScheduledCrop {
    pub due: Timestamp,
    pub id: CropId,
    pub world: WorldId,
    pub chunk: ChunkPos,
    pub key: LocalKey,
}

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub queues_visited: usize,
    pub rescheduled: usize,
    pub dropped: usize,
}

type ReadyQueue = BTreeSet<ScheduledCrop>;

pub struct Scheduler {
    queues: Vec<ReadyQueue>,
    /// `(len, slot)` pairs, least loaded first.
    occupancy: BTreeSet<(usize, QueueSlot)>,
    size: usize,
    cursor: f64,
    step: f64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let mut scheduler = Self {
            queues: Vec::new(),
            occupancy: BTreeSet::new(),
            size: 0,
            cursor: 0.0,
            step: 1.0,
        };
        scheduler.push_queue();
        scheduler
    }

    /// Number of scheduled entries.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Queues visited per tick (fractional).
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Entries held by each queue, by slot.
    pub fn queue_lens(&self) -> Vec<usize> {
        self.queues.iter().map(BTreeSet::len).collect()
    }

    pub fn contains(&self, slot: QueueSlot, entry: &ScheduledCrop) -> bool {
        self.queues
            .get(slot.0 as usize)
            .is_some_and(|queue| queue.contains(entry))
    }

    fn push_queue(&mut self) {
        let slot = QueueSlot(self.queues.len() as u32);
        self.queues.push(ReadyQueue::new());
        self.occupancy.insert((0, slot));
    }

    fn ensure_capacity(&mut self) {
        let target = ((self.size + 1) as f64).sqrt() / 4.0;
        let target = target.ceil() as usize;
        if self.queues.len() < target {
            while self.queues.len() < target {
                self.push_queue();
            }
            self.step = (target as f64 / 20.0).max(1.0);
            debug!(queues = target, step = self.step, "scheduler grew");
        }
    }

    fn rerank(&mut self, slot: QueueSlot, old_len: usize) {
        let new_len = self.queues[slot.0 as usize].len();
        if old_len != new_len {
            self.occupancy.remove(&(old_len, slot));
            self.occupancy.insert((new_len, slot));
        }
    }

    /// Schedule an entry on the least loaded queue.
    pub fn register(&mut self, entry: ScheduledCrop) -> QueueSlot {
        self.ensure_capacity();

        let (len, slot) = match self.occupancy.pop_first() {
            Some(least) => least,
            None => unreachable!("scheduler always owns at least one queue"),
        };
        let queue = &mut self.queues[slot.0 as usize];
        queue.insert(entry);
        self.occupancy.insert((queue.len(), slot));
        debug_assert_eq!(queue.len(), len + 1);
        self.size += 1;
        slot
    }

    /// Remove an entry; returns false when it was not in that queue.
    pub fn unregister(&mut self, slot: QueueSlot, entry: &ScheduledCrop) -> bool {
        let Some(queue) = self.queues.get_mut(slot.0 as usize) else {
            return false;
        };
        let old_len = queue.len();
        if !queue.remove(entry) {
            return false;
        }
        self.rerank(slot, old_len);
        self.size -= 1;
        true
    }

    /// Drain due entries from the queues the cursor crosses this tick.
    ///
    /// The visitor returns `Some(next_due)` to keep an entry scheduled in the
    /// same queue, or `None` to drop it.
    pub fn sweep<F>(&mut self, now: Timestamp, mut visit: F) -> SweepStats
    where
        F: FnMut(QueueSlot, &ScheduledCrop) -> Option<Timestamp>,
    {
        let mut stats = SweepStats::default();
        let count = self.queues.len();

        let from = self.cursor as usize;
        self.cursor += self.step;
        let to = self.cursor as usize;

        for i in from..to {
            let slot = QueueSlot((i % count) as u32);
            let queue = &mut self.queues[slot.0 as usize];
            let old_len = queue.len();

            let mut due = Vec::new();
            while queue.first().is_some_and(|entry| entry.due <= now) {
                if let Some(entry) = queue.pop_first() {
                    due.push(entry);
                }
            }

            for entry in due {
                match visit(slot, &entry) {
                    Some(next) => {
                        self.queues[slot.0 as usize].insert(ScheduledCrop { due: next, ..entry });
                        stats.rescheduled += 1;
                    }
                    None => {
                        self.size -= 1;
                        stats.dropped += 1;
                    }
                }
            }

            self.rerank(slot, old_len);
            stats.queues_visited += 1;
        }

        if self.cursor >= count as f64 {
            self.cursor -= count as f64;
        }
        stats
    }
}
