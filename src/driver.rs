//! Headless driver: plants a demo field and runs the farm tick loop.

use anyhow::{Context, Result};
use farmstead_core::{Clock, ManualClock, SystemClock, Timestamp};
use farmstead_testkit::{EventRecord, JsonlSink};
use farmstead_world::{
    blocks, BlockPos, ChunkPos, CropKindId, CropRegistry, Effect, Farm, FarmError, ObserverId,
    RegionCropStore, Terrain, TickReport, VoxelTerrain, WorldId,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::FarmConfig;

const DEMO_WORLD: &str = "demo";
const FIELD_Y: i32 = 64;
/// Distance between planted kinds, wide enough for a tree canopy.
const FIELD_SPACING: i32 = 8;
const FIELD_COLUMNS: i32 = 4;
const TERRAIN_CHUNKS: usize = 16;
const WATCHER: ObserverId = ObserverId(1);

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub ticks: u64,
    /// Advance a manual clock by `tick_millis` per tick instead of sleeping.
    pub simulate: bool,
    pub events: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub planted: usize,
    pub rescheduled: usize,
    pub finished: usize,
    pub chunks_unloaded: usize,
    pub remaining: usize,
}

enum DriverClock {
    System(SystemClock),
    Manual(ManualClock),
}

impl DriverClock {
    fn now(&self) -> Timestamp {
        match self {
            DriverClock::System(clock) => clock.now(),
            DriverClock::Manual(clock) => clock.now(),
        }
    }

    fn wait(&self, millis: u64) {
        match self {
            DriverClock::System(_) => std::thread::sleep(Duration::from_millis(millis)),
            DriverClock::Manual(clock) => clock.advance(millis),
        }
    }
}

/// Optional JSONL event log.
struct EventLog {
    sink: Option<JsonlSink>,
}

impl EventLog {
    fn open(path: Option<&PathBuf>) -> Result<Self> {
        let sink = match path {
            Some(path) => Some(
                JsonlSink::create(path)
                    .with_context(|| format!("failed to open event log {}", path.display()))?,
            ),
            None => None,
        };
        Ok(Self { sink })
    }

    fn record(&mut self, farm: &Farm<VoxelTerrain>, at: Timestamp, kind: &str, payload: String) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let event = EventRecord::new(farm.current_tick(), at, kind, payload);
        if let Err(err) = sink.write(&event) {
            warn!(%err, "failed to write event, disabling event log");
            self.sink = None;
        }
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
            info!(events = sink.written(), "event log written");
        }
        Ok(())
    }
}

pub fn run(config: &FarmConfig, registry: CropRegistry, opts: &RunOptions) -> Result<RunSummary> {
    let store = RegionCropStore::open(&config.store_dir)
        .with_context(|| format!("failed to open crop store {}", config.store_dir.display()))?;
    let mut farm = Farm::new(registry, Box::new(store), config.settings());
    let mut events = EventLog::open(opts.events.as_ref())?;

    let clock = if opts.simulate {
        DriverClock::Manual(ManualClock::new(SystemClock.now()))
    } else {
        DriverClock::System(SystemClock)
    };

    let start = clock.now();
    let world = farm
        .load_world(DEMO_WORLD, VoxelTerrain::new(TERRAIN_CHUNKS), start)
        .context("failed to load demo world")?;
    let planted = plant_demo_field(&mut farm, world, start, &mut events)?;
    info!(planted, world = DEMO_WORLD, "demo field planted");

    let mut summary = RunSummary {
        planted,
        ..RunSummary::default()
    };
    let mut last_label = String::new();
    for _ in 0..opts.ticks {
        clock.wait(config.tick_millis);
        let now = clock.now();
        let report = farm.tick(now);
        summary.ticks += 1;
        summary.rescheduled += report.sweep.rescheduled;
        summary.finished += report.sweep.dropped;
        summary.chunks_unloaded += report.chunks_unloaded;
        record_tick(&mut farm, world, now, &report, &mut events)?;

        if let Some(timer) = farm.timers().get(WATCHER) {
            if timer.is_visible() && timer.label() != last_label {
                last_label = timer.label().to_string();
                events.record(&farm, now, "timer", format!("{} {}", timer.pos, last_label));
            }
        }
    }

    summary.remaining = farm.world(world)?.crop_count();
    farm.unload_world(world)?;
    farm.shutdown().context("failed to close crop store")?;
    events.finish()?;
    Ok(summary)
}

/// Write effects and sweep results of one tick to the log.
fn record_tick(
    farm: &mut Farm<VoxelTerrain>,
    world: WorldId,
    now: Timestamp,
    report: &TickReport,
    events: &mut EventLog,
) -> Result<(), FarmError> {
    let terrain = farm.terrain_mut(world)?;
    let effects = terrain.take_effects();
    let touched = terrain.take_dirty_chunks();
    if !touched.is_empty() {
        debug!(chunks = touched.len(), tick = report.tick, "terrain changed");
    }

    if report.sweep.rescheduled + report.sweep.dropped > 0 {
        events.record(
            farm,
            now,
            "sweep",
            format!(
                "rescheduled={} dropped={}",
                report.sweep.rescheduled, report.sweep.dropped
            ),
        );
    }
    for (pos, effect) in effects {
        let kind = match effect {
            Effect::GrowthComplete => "growth_complete",
            Effect::Smoke => "growth_blocked",
        };
        events.record(farm, now, kind, pos.to_string());
    }
    if report.timers_evicted > 0 {
        events.record(farm, now, "timer_evicted", report.timers_evicted.to_string());
    }
    Ok(())
}

/// Plant one crop of every registered kind on a grid and watch the first.
fn plant_demo_field(
    farm: &mut Farm<VoxelTerrain>,
    world: WorldId,
    now: Timestamp,
    events: &mut EventLog,
) -> Result<usize> {
    let plots: Vec<(CropKindId, BlockPos)> = farm
        .registry()
        .iter()
        .enumerate()
        .map(|(index, (id, _))| (id, plot_position(index as i32)))
        .collect();

    let mut planted = 0;
    for &(kind, pos) in &plots {
        load_host_chunk(farm, world, pos.chunk(), now)?;
        let Some(block) = farm.registry().get(kind).map(|kind| {
            let first = kind.table.first_stage().voxel;
            if kind.directional {
                blocks::with_facing(first, blocks::Facing::East)
            } else {
                first
            }
        }) else {
            continue;
        };
        farm.terrain_mut(world)?.set_block(pos, block);
        farm.add_crop(world, pos, kind, now)?;
        events.record(farm, now, "crop_planted", pos.to_string());
        planted += 1;
    }

    if let Some(&(_, pos)) = plots.first() {
        farm.add_timer(WATCHER, world, pos, now)?;
    }
    Ok(planted)
}

fn plot_position(index: i32) -> BlockPos {
    let x = (index % FIELD_COLUMNS) * FIELD_SPACING + 4;
    let z = (index / FIELD_COLUMNS) * FIELD_SPACING + 4;
    BlockPos::new(x, FIELD_Y, z)
}

/// Load terrain for a chunk, passivating whatever the terrain cache evicts.
fn load_host_chunk(
    farm: &mut Farm<VoxelTerrain>,
    world: WorldId,
    pos: ChunkPos,
    now: Timestamp,
) -> Result<(), FarmError> {
    if farm.world(world)?.terrain().is_loaded(pos) {
        return Ok(());
    }
    let evicted = farm.terrain_mut(world)?.load_chunk(pos);
    for chunk in evicted {
        farm.deactivate_chunk(world, chunk)?;
    }
    farm.activate_chunk(world, pos, now)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmstead_testkit::{read_events, TempDir};

    fn simulated(ticks: u64, dir: &TempDir) -> RunOptions {
        RunOptions {
            ticks,
            simulate: true,
            events: Some(dir.join("events.jsonl")),
        }
    }

    #[test]
    fn plots_do_not_share_positions() {
        let mut seen = std::collections::BTreeSet::new();
        for index in 0..16 {
            assert!(seen.insert(plot_position(index)));
        }
    }

    #[test]
    fn simulated_run_grows_every_kind() {
        let dir = TempDir::new("driver_run").expect("temp dir");
        let config = FarmConfig {
            tick_millis: 1_000,
            store_dir: dir.join("store"),
            ..FarmConfig::default()
        };
        let registry = CropRegistry::standard();
        let kinds = registry.len();

        let summary = run(&config, registry, &simulated(400, &dir)).expect("run completes");
        assert_eq!(summary.ticks, 400);
        assert_eq!(summary.planted, kinds);
        assert_eq!(summary.finished, kinds);
        assert_eq!(summary.remaining, 0);

        let events = read_events(dir.join("events.jsonl")).expect("events readable");
        let planted = events.iter().filter(|e| e.kind == "crop_planted").count();
        let complete = events.iter().filter(|e| e.kind == "growth_complete").count();
        assert_eq!(planted, kinds);
        assert_eq!(complete, kinds);
        assert!(events.iter().any(|e| e.kind == "timer"));
    }

    #[test]
    fn short_run_leaves_crops_in_the_store() {
        let dir = TempDir::new("driver_short").expect("temp dir");
        let config = FarmConfig {
            tick_millis: 50,
            store_dir: dir.join("store"),
            ..FarmConfig::default()
        };
        let summary = run(&config, CropRegistry::standard(), &simulated(5, &dir))
            .expect("run completes");
        assert_eq!(summary.finished, 0);
        assert_eq!(summary.remaining, summary.planted);
    }
}
