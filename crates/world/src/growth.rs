//! Growth stage tables.
//!
//! A table is an ordered list of growth stages followed by one terminal
//! result. Each growth stage carries a cumulative threshold (`time`): a crop
//! whose elapsed growing time is below a stage's threshold shows that stage.

use crate::chunk::Voxel;
use crate::trees::TreeType;

/// One visible growth phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthStage {
    /// Block written while the crop is in this stage.
    pub voxel: Voxel,
    /// Length of this stage in milliseconds.
    pub duration: u64,
    /// Cumulative threshold in milliseconds since planting.
    pub time: u64,
}

/// What happens once every growth stage has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowthResult {
    /// Replace the crop with a final block.
    Block(Voxel),
    /// Grow a tree (or huge mushroom) in place of the sapling.
    Tree(TreeType),
}

/// Stage resolved for an elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage<'a> {
    Growth { index: usize, stage: &'a GrowthStage },
    Result(&'a GrowthResult),
}

impl Stage<'_> {
    pub fn is_result(&self) -> bool {
        matches!(self, Stage::Result(_))
    }

    /// Growth stage index, `None` for the result.
    pub fn index(&self) -> Option<usize> {
        match self {
            Stage::Growth { index, .. } => Some(*index),
            Stage::Result(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrowthTable {
    stages: Vec<GrowthStage>,
    result: GrowthResult,
    duration: u64,
}

impl GrowthTable {
    /// Build a table from the voxels of each growth stage.
    ///
    /// # Panics
    /// Panics when `stages` is empty; every kind needs at least one stage.
    pub fn new(stages: impl IntoIterator<Item = Voxel>, result: GrowthResult, duration: u64) -> Self {
        let stages: Vec<GrowthStage> = stages
            .into_iter()
            .map(|voxel| GrowthStage {
                voxel,
                duration: 0,
                time: 0,
            })
            .collect();
        assert!(!stages.is_empty(), "growth table needs at least one stage");

        let mut table = Self {
            stages,
            result,
            duration: 0,
        };
        table.set_duration(duration);
        table
    }

    /// Total time from planting to the result, in milliseconds.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Redistribute `duration` evenly across the stages.
    ///
    /// Stage `i` of `n` ends at `duration * (i + 1) / n`.
    pub fn set_duration(&mut self, duration: u64) {
        let count = self.stages.len() as u128;
        let mut prev_time = 0u64;

        for (i, stage) in self.stages.iter_mut().enumerate() {
            let time = (duration as u128 * (i as u128 + 1) / count) as u64;
            stage.time = time;
            stage.duration = time - prev_time;
            prev_time = time;
        }

        self.duration = duration;
    }

    pub fn stages(&self) -> &[GrowthStage] {
        &self.stages
    }

    pub fn first_stage(&self) -> &GrowthStage {
        &self.stages[0]
    }

    pub fn result(&self) -> &GrowthResult {
        &self.result
    }

    /// Stage shown after `elapsed` milliseconds of growth.
    pub fn stage_at(&self, elapsed: u64) -> Stage<'_> {
        self.stages
            .iter()
            .enumerate()
            .find(|(_, stage)| elapsed < stage.time)
            .map(|(index, stage)| Stage::Growth { index, stage })
            .unwrap_or(Stage::Result(&self.result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks;

    fn stem_table(duration: u64) -> GrowthTable {
        GrowthTable::new(
            (0..=7).map(|age| blocks::aged(blocks::MELON_STEM, age)),
            GrowthResult::Block(Voxel::new(blocks::MELON)),
            duration,
        )
    }

    #[test]
    fn thresholds_are_even_and_cumulative() {
        let table = stem_table(300_000);
        let times: Vec<u64> = table.stages().iter().map(|s| s.time).collect();
        assert_eq!(
            times,
            vec![37_500, 75_000, 112_500, 150_000, 187_500, 225_000, 262_500, 300_000]
        );
        assert!(table.stages().iter().all(|s| s.duration == 37_500));
    }

    #[test]
    fn uneven_durations_still_sum_to_total() {
        let table = stem_table(1_001);
        let total: u64 = table.stages().iter().map(|s| s.duration).sum();
        assert_eq!(total, 1_001);
        assert_eq!(table.stages().last().unwrap().time, 1_001);
        for pair in table.stages().windows(2) {
            assert!(pair[0].time < pair[1].time);
        }
    }

    #[test]
    fn set_duration_is_idempotent() {
        let mut table = stem_table(300_000);
        let before = table.clone();
        table.set_duration(300_000);
        assert_eq!(table, before);

        table.set_duration(80);
        table.set_duration(300_000);
        assert_eq!(table, before);
    }

    #[test]
    fn zero_duration_goes_straight_to_result() {
        let table = stem_table(0);
        assert!(table.stages().iter().all(|s| s.time == 0 && s.duration == 0));
        assert!(table.stage_at(0).is_result());
    }

    #[test]
    fn stage_lookup_walks_thresholds() {
        let table = stem_table(300_000);
        assert_eq!(table.stage_at(0).index(), Some(0));
        assert_eq!(table.stage_at(37_499).index(), Some(0));
        assert_eq!(table.stage_at(37_500).index(), Some(1));
        assert_eq!(table.stage_at(299_999).index(), Some(7));
        assert!(table.stage_at(300_000).is_result());
        assert!(table.stage_at(u64::MAX).is_result());
    }

    #[test]
    fn single_stage_tables_work() {
        let table = GrowthTable::new(
            [Voxel::new(blocks::OAK_SAPLING)],
            GrowthResult::Tree(TreeType::Oak),
            1_000,
        );
        assert_eq!(table.first_stage().time, 1_000);
        assert_eq!(table.stage_at(999).index(), Some(0));
        assert_eq!(
            table.stage_at(1_000),
            Stage::Result(&GrowthResult::Tree(TreeType::Oak))
        );
    }
}
