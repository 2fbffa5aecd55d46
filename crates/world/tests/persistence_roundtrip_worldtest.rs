//! Persistence round-trip worldtest
//!
//! Plants crops through a farm backed by region files, shuts it down, then
//! reopens the directory with a fresh farm and checks that every crop comes
//! back with the same planting time and next due time.

use farmstead_core::Timestamp;
use farmstead_testkit::TempDir;
use farmstead_world::{
    blocks, BlockPos, ChunkPos, CropKindId, CropRegistry, CropStore, Farm, FarmSettings,
    RegionCropStore, Stage, Terrain, VoxelTerrain,
};

const T0: Timestamp = Timestamp(5_000_000);
const WORLD: &str = "homestead";

fn farm_at(dir: &TempDir) -> Farm<VoxelTerrain> {
    let store = RegionCropStore::open(dir.path()).expect("store opens");
    Farm::new(
        CropRegistry::standard(),
        Box::new(store),
        FarmSettings::default(),
    )
}

/// Wheat scattered over four chunks, two of them in a negative region.
fn wheat_positions() -> Vec<BlockPos> {
    vec![
        BlockPos::new(1, 64, 1),
        BlockPos::new(2, 64, 1),
        BlockPos::new(17, 70, 3),
        BlockPos::new(-5, 64, -5),
        BlockPos::new(-600, 64, 40),
    ]
}

fn chunks_of(positions: &[BlockPos]) -> Vec<ChunkPos> {
    let mut chunks: Vec<ChunkPos> = positions.iter().map(|pos| pos.chunk()).collect();
    chunks.sort_by_key(|chunk| chunk.key());
    chunks.dedup();
    chunks
}

fn wheat_field(positions: &[BlockPos]) -> VoxelTerrain {
    let mut terrain = VoxelTerrain::new(16);
    for chunk in chunks_of(positions) {
        terrain.load_chunk(chunk);
    }
    for &pos in positions {
        terrain.set_block(pos, blocks::aged(blocks::WHEAT, 0));
    }
    terrain
}

fn wheat(farm: &Farm<VoxelTerrain>) -> CropKindId {
    farm.registry().by_key("wheat").expect("wheat kind")
}

#[test]
fn persistence_roundtrip_worldtest() {
    let dir = TempDir::new("persist").expect("temp dir");
    let positions = wheat_positions();
    let activate_at = T0.plus(50_000);

    // First session: plant, commit on tick, shut down.
    let terrain = {
        let mut farm = farm_at(&dir);
        let world = farm.load_world(WORLD, wheat_field(&positions), T0).unwrap();
        let kind = wheat(&farm);
        for &pos in &positions {
            farm.add_crop(world, pos, kind, T0).unwrap();
        }
        farm.tick(T0.plus(1));
        let terrain = farm.unload_world(world).unwrap();
        farm.shutdown().expect("store closes");
        terrain
    };

    // Second session: a fresh farm sees the same crops in the chunks the
    // terrain still holds, without any explicit activation.
    let mut farm = farm_at(&dir);
    let world = farm.load_world(WORLD, terrain, activate_at).unwrap();
    assert_eq!(farm.scheduler().len(), positions.len());
    for chunk in chunks_of(&positions) {
        assert_eq!(farm.activate_chunk(world, chunk, activate_at).unwrap(), 0);
    }

    let kind = farm.registry().get(wheat(&farm)).unwrap();
    let expected_due = match kind.table.stage_at(activate_at.since(T0)) {
        Stage::Growth { stage, .. } => T0.plus(stage.time),
        Stage::Result(_) => panic!("wheat should still be growing"),
    };
    // 2 * 300000 / 7 rounded down.
    assert_eq!(expected_due, T0.plus(85_714));

    for &pos in &positions {
        let record = farm.crop_at(world, pos).unwrap().expect("crop restored");
        assert_eq!(record.planted_at, T0);
        assert_eq!(record.next_due, Some(expected_due));
        assert!(record.is_scheduled());
        let block = farm.world(world).unwrap().terrain().block(pos);
        assert_eq!(block, Some(blocks::aged(blocks::WHEAT, 1)));
    }
    farm.shutdown().expect("store closes");
}

#[test]
fn removed_crops_stay_removed_after_close() {
    let dir = TempDir::new("purge").expect("temp dir");
    let positions = wheat_positions();
    let gone = positions[0];

    let terrain = {
        let mut farm = farm_at(&dir);
        let world = farm.load_world(WORLD, wheat_field(&positions), T0).unwrap();
        let kind = wheat(&farm);
        for &pos in &positions {
            farm.add_crop(world, pos, kind, T0).unwrap();
        }
        farm.tick(T0.plus(1));
        farm.remove_crop(world, gone).unwrap();
        let terrain = farm.unload_world(world).unwrap();
        farm.shutdown().expect("store closes");
        terrain
    };

    let mut store = RegionCropStore::open(dir.path()).unwrap();
    let rows = store.load_chunk(WORLD, gone.chunk()).unwrap();
    assert!(rows.iter().all(|row| row.pos != gone));
    assert_eq!(rows.len(), 1);

    let mut farm = farm_at(&dir);
    let world = farm.load_world(WORLD, terrain, T0).unwrap();
    assert!(farm.crop_at(world, gone).unwrap().is_none());
    assert!(farm.crop_at(world, positions[1]).unwrap().is_some());
}

#[test]
fn uncommitted_crops_are_lost_without_shutdown() {
    let dir = TempDir::new("crash").expect("temp dir");
    let pos = BlockPos::new(4, 64, 4);

    {
        let mut farm = farm_at(&dir);
        let world = farm.load_world(WORLD, wheat_field(&[pos]), T0).unwrap();
        let kind = wheat(&farm);
        farm.add_crop(world, pos, kind, T0).unwrap();
        // Dropped without a tick or shutdown.
    }

    let mut store = RegionCropStore::open(dir.path()).unwrap();
    assert!(store.world_id(WORLD).is_some());
    assert!(store.load_chunk(WORLD, pos.chunk()).unwrap().is_empty());
}

#[test]
fn worlds_keep_separate_rows() {
    let dir = TempDir::new("worlds").expect("temp dir");
    let pos = BlockPos::new(8, 64, 8);

    {
        let mut farm = farm_at(&dir);
        let home = farm.load_world(WORLD, wheat_field(&[pos]), T0).unwrap();
        let other = farm.load_world("annex", wheat_field(&[pos]), T0).unwrap();
        let kind = wheat(&farm);
        farm.add_crop(home, pos, kind, T0).unwrap();
        farm.add_crop(other, pos, kind, T0.plus(7)).unwrap();
        farm.shutdown().expect("store closes");
    }

    let mut store = RegionCropStore::open(dir.path()).unwrap();
    assert_ne!(store.world_id(WORLD), store.world_id("annex"));
    let home = store.load_chunk(WORLD, pos.chunk()).unwrap();
    let annex = store.load_chunk("annex", pos.chunk()).unwrap();
    assert_eq!(home.len(), 1);
    assert_eq!(annex.len(), 1);
    assert_eq!(home[0].planted_at, T0);
    assert_eq!(annex[0].planted_at, T0.plus(7));
}
