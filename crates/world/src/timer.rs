//! Countdown labels shown to observers looking at a crop.

use std::collections::BTreeMap;

use crate::chunk::BlockPos;
use crate::crop::CropId;
use crate::world::WorldId;

const SECOND: u64 = 1_000;
const MINUTE: u64 = SECOND * 60;
const HOUR: u64 = MINUTE * 60;
const DAY: u64 = HOUR * 24;

const UNITS: [(u64, &str); 4] = [(DAY, "d"), (HOUR, "h"), (MINUTE, "m"), (SECOND, "s")];

/// Render a duration with its largest unit and, when non-zero, the next one.
///
/// `format_remaining(93_784_000)` gives `"1d 2h"`.
pub fn format_remaining(millis: u64) -> String {
    let index = UNITS
        .iter()
        .position(|(unit, _)| millis >= *unit)
        .unwrap_or(UNITS.len() - 1);
    let (unit, name) = UNITS[index];

    let mut label = format!("{}{}", millis / unit, name);
    if let Some(&(child, child_name)) = UNITS.get(index + 1) {
        let rest = (millis % unit) / child;
        if rest > 0 {
            label.push_str(&format!(" {rest}{child_name}"));
        }
    }
    label
}

/// Who is watching a timer. Assigned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropTimer {
    pub world: WorldId,
    pub pos: BlockPos,
    pub crop: CropId,
    label: String,
    refreshes: u32,
}

impl CropTimer {
    pub fn new(world: WorldId, pos: BlockPos, crop: CropId) -> Self {
        Self {
            world,
            pos,
            crop,
            label: String::new(),
            refreshes: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Labels show from the second refresh on.
    pub fn is_visible(&self) -> bool {
        self.refreshes >= 2
    }

    fn update(&mut self, remaining: u64) {
        self.label = format_remaining(remaining.saturating_add(999));
        self.refreshes = self.refreshes.saturating_add(1);
    }
}

/// One timer per observer.
#[derive(Debug, Default)]
pub struct TimerBoard {
    timers: BTreeMap<ObserverId, CropTimer>,
}

impl TimerBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn get(&self, observer: ObserverId) -> Option<&CropTimer> {
        self.timers.get(&observer)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObserverId, &CropTimer)> {
        self.timers.iter().map(|(id, timer)| (*id, timer))
    }

    /// Attach a timer with its first reading, replacing the observer's previous one.
    pub fn attach(
        &mut self,
        observer: ObserverId,
        mut timer: CropTimer,
        remaining: u64,
    ) -> Option<CropTimer> {
        timer.update(remaining);
        self.timers.insert(observer, timer)
    }

    pub fn detach(&mut self, observer: ObserverId) -> Option<CropTimer> {
        self.timers.remove(&observer)
    }

    /// Recompute every label. `remaining` returns the time left for a timer's
    /// crop, or `None` when the timer should be evicted. Returns the evicted
    /// observers.
    pub fn refresh<F>(&mut self, mut remaining: F) -> Vec<ObserverId>
    where
        F: FnMut(&CropTimer) -> Option<u64>,
    {
        let mut evicted = Vec::new();
        self.timers.retain(|observer, timer| match remaining(timer) {
            Some(left) => {
                timer.update(left);
                true
            }
            None => {
                evicted.push(*observer);
                false
            }
        });
        evicted
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_largest_unit_pair() {
        assert_eq!(format_remaining(12_000), "12s");
        assert_eq!(format_remaining(330_000), "5m 30s");
        assert_eq!(format_remaining(300_000), "5m");
        assert_eq!(format_remaining(93_784_000), "1d 2h");
        assert_eq!(format_remaining(HOUR), "1h");
        assert_eq!(format_remaining(0), "0s");
        assert_eq!(format_remaining(999), "0s");
    }

    #[test]
    fn label_rounds_up_to_the_second() {
        let mut board = TimerBoard::new();
        let timer = CropTimer::new(WorldId::new(0, 0), BlockPos::new(0, 64, 0), CropId(1));
        board.attach(ObserverId(1), timer, 1);
        assert_eq!(board.get(ObserverId(1)).unwrap().label(), "1s");
    }

    #[test]
    fn visible_from_second_refresh() {
        let mut board = TimerBoard::new();
        let timer = CropTimer::new(WorldId::new(0, 0), BlockPos::new(0, 64, 0), CropId(1));
        board.attach(ObserverId(7), timer, 60_000);
        assert!(!board.get(ObserverId(7)).unwrap().is_visible());

        let evicted = board.refresh(|_| Some(59_000));
        assert!(evicted.is_empty());
        let timer = board.get(ObserverId(7)).unwrap();
        assert!(timer.is_visible());
        assert_eq!(timer.label(), "59s");
    }

    #[test]
    fn refresh_evicts_rejected_timers() {
        let mut board = TimerBoard::new();
        for (observer, crop) in [(1, 10), (2, 20)] {
            let timer = CropTimer::new(WorldId::new(0, 0), BlockPos::new(0, 64, 0), CropId(crop));
            board.attach(ObserverId(observer), timer, 1_000);
        }
        let evicted = board.refresh(|timer| (timer.crop == CropId(10)).then_some(500));
        assert_eq!(evicted, vec![ObserverId(2)]);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn attach_replaces_previous_timer() {
        let mut board = TimerBoard::new();
        let first = CropTimer::new(WorldId::new(0, 0), BlockPos::new(0, 64, 0), CropId(1));
        let second = CropTimer::new(WorldId::new(0, 0), BlockPos::new(1, 64, 0), CropId(2));
        assert!(board.attach(ObserverId(1), first, 0).is_none());
        let replaced = board.attach(ObserverId(1), second, 0).unwrap();
        assert_eq!(replaced.crop, CropId(1));
        assert_eq!(board.detach(ObserverId(1)).unwrap().crop, CropId(2));
    }
}
