//! Region-file crop storage with zstd compression.
//!
//! Each world gets a directory of `.rg` region files grouping 32x32 chunks.
//! A file is a 14-byte header (magic, version, CRC32, payload length) followed
//! by a zstd-compressed bincode map of rows. `worlds.json` maps world names to
//! the numeric ids used for directory names.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crc32fast::Hasher;
use farmstead_core::Timestamp;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CropRow, CropStore, StoreError};
use crate::chunk::{BlockPos, ChunkPos};

/// Magic number for region file identification ("FSRG").
const REGION_MAGIC: u32 = 0x4653_5247;

const REGION_VERSION: u16 = 1;

/// Region size in chunks (32x32 chunks per region).
const REGION_SIZE: i32 = 32;

const HEADER_LEN: usize = 14;

/// Regions kept decoded in memory.
const CACHED_REGIONS: usize = 64;

const WORLD_INDEX: &str = "worlds.json";

#[derive(Debug, Clone, PartialEq, Eq)]
struct RegionHeader {
    magic: u32,
    version: u16,
    crc32: u32,
    payload_len: u32,
}

impl RegionHeader {
    fn new(crc32: u32, payload_len: u32) -> Self {
        Self {
            magic: REGION_MAGIC,
            version: REGION_VERSION,
            crc32,
            payload_len,
        }
    }

    fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
        bytes[6..10].copy_from_slice(&self.crc32.to_le_bytes());
        bytes[10..14].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8; HEADER_LEN]) -> Result<Self, String> {
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != REGION_MAGIC {
            return Err(format!(
                "invalid magic: expected 0x{REGION_MAGIC:08X}, got 0x{magic:08X}"
            ));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != REGION_VERSION {
            return Err(format!("unsupported version {version}"));
        }
        Ok(Self {
            magic,
            version,
            crc32: u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
            payload_len: u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct StoredRow {
    planted_at: Timestamp,
    deleted: bool,
}

type Rows = BTreeMap<BlockPos, StoredRow>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct RegionKey {
    world: u32,
    x: i32,
    z: i32,
}

impl RegionKey {
    fn of(world: u32, chunk: ChunkPos) -> Self {
        Self {
            world,
            x: chunk.x.div_euclid(REGION_SIZE),
            z: chunk.z.div_euclid(REGION_SIZE),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WorldIndex {
    next_id: u32,
    worlds: BTreeMap<String, u32>,
}

/// Crop store writing region files under one directory.
pub struct RegionCropStore {
    root: PathBuf,
    index: WorldIndex,
    /// Clean regions as last read from or written to disk.
    regions: LruCache<RegionKey, Rows>,
    /// Regions with unflushed writes; never evicted before commit.
    dirty: BTreeMap<RegionKey, Rows>,
}

impl RegionCropStore {
    /// Open (or create) a store rooted at `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;

        let index_path = root.join(WORLD_INDEX);
        let index = if index_path.exists() {
            serde_json::from_slice(&fs::read(&index_path)?)?
        } else {
            WorldIndex::default()
        };

        let capacity = NonZeroUsize::new(CACHED_REGIONS).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            root,
            index,
            regions: LruCache::new(capacity),
            dirty: BTreeMap::new(),
        })
    }

    /// Numeric id assigned to a saved world.
    pub fn world_id(&self, name: &str) -> Option<u32> {
        self.index.worlds.get(name).copied()
    }

    fn resolve(&self, world: &str) -> Result<u32, StoreError> {
        self.world_id(world)
            .ok_or_else(|| StoreError::UnknownWorld(world.to_string()))
    }

    fn write_index(&self) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(&self.index)?;
        fs::write(self.root.join(WORLD_INDEX), json)?;
        Ok(())
    }

    /// Rows of a region for writing; the region moves into the dirty set.
    fn rows_mut(&mut self, key: RegionKey) -> Result<&mut Rows, StoreError> {
        match self.dirty.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let rows = match self.regions.pop(&key) {
                    Some(rows) => rows,
                    None => read_region(&region_path(&self.root, key))?,
                };
                Ok(entry.insert(rows))
            }
        }
    }

    /// Rows of a region for reading: dirty copy first, then cache, then disk.
    fn rows(&mut self, key: RegionKey) -> Result<&Rows, StoreError> {
        if let Some(rows) = self.dirty.get(&key) {
            return Ok(rows);
        }
        let path = region_path(&self.root, key);
        self.regions.try_get_or_insert(key, || read_region(&path))
    }

    /// Every region file present on disk for the known worlds.
    fn region_keys_on_disk(&self) -> Result<BTreeSet<RegionKey>, StoreError> {
        let mut keys = BTreeSet::new();
        for &world in self.index.worlds.values() {
            let dir = world_dir(&self.root, world);
            if !dir.exists() {
                continue;
            }
            for entry in fs::read_dir(&dir)? {
                let name = entry?.file_name();
                let Some(name) = name.to_str() else { continue };
                if let Some((x, z)) = parse_region_name(name) {
                    keys.insert(RegionKey { world, x, z });
                }
            }
        }
        Ok(keys)
    }
}

fn world_dir(root: &Path, world: u32) -> PathBuf {
    root.join(format!("w{world}"))
}

fn region_path(root: &Path, key: RegionKey) -> PathBuf {
    world_dir(root, key.world).join(format!("r.{}.{}.rg", key.x, key.z))
}

/// Read a region, treating a missing file as empty.
fn read_region(path: &Path) -> Result<Rows, StoreError> {
    if !path.exists() {
        return Ok(Rows::new());
    }
    read_region_file(path)
}

fn parse_region_name(name: &str) -> Option<(i32, i32)> {
    let coords = name.strip_prefix("r.")?.strip_suffix(".rg")?;
    let (x, z) = coords.split_once('.')?;
    Some((x.parse().ok()?, z.parse().ok()?))
}

fn corrupt(path: &Path, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

fn read_region_file(path: &Path) -> Result<Rows, StoreError> {
    let mut file = File::open(path)?;

    let mut header_bytes = [0u8; HEADER_LEN];
    file.read_exact(&mut header_bytes)
        .map_err(|_| corrupt(path, "region header too short"))?;
    let header = RegionHeader::from_bytes(&header_bytes).map_err(|reason| corrupt(path, reason))?;

    let mut compressed = vec![0u8; header.payload_len as usize];
    file.read_exact(&mut compressed)
        .map_err(|_| corrupt(path, "truncated payload"))?;

    let mut hasher = Hasher::new();
    hasher.update(&compressed);
    let computed = hasher.finalize();
    if computed != header.crc32 {
        return Err(corrupt(
            path,
            format!(
                "CRC32 mismatch: expected {:08X}, got {:08X}",
                header.crc32, computed
            ),
        ));
    }

    let decompressed = zstd::decode_all(&compressed[..])?;
    Ok(bincode::deserialize(&decompressed)?)
}

fn write_region_file(path: &Path, rows: &Rows) -> Result<(), StoreError> {
    let serialized = bincode::serialize(rows)?;
    let compressed = zstd::encode_all(&serialized[..], 3)?;

    let mut hasher = Hasher::new();
    hasher.update(&compressed);
    let header = RegionHeader::new(hasher.finalize(), compressed.len() as u32);

    let mut file = File::create(path)?;
    file.write_all(&header.to_bytes())?;
    file.write_all(&compressed)?;
    Ok(())
}

impl CropStore for RegionCropStore {
    fn save_world(&mut self, name: &str) -> Result<(), StoreError> {
        if self.index.worlds.contains_key(name) {
            return Ok(());
        }
        let id = self.index.next_id;
        self.index.next_id += 1;
        self.index.worlds.insert(name.to_string(), id);
        self.write_index()?;
        debug!(world = name, id, "registered world in region store");
        Ok(())
    }

    fn save_crop(&mut self, world: &str, row: CropRow) -> Result<(), StoreError> {
        let key = RegionKey::of(self.resolve(world)?, row.pos.chunk());
        self.rows_mut(key)?.insert(
            row.pos,
            StoredRow {
                planted_at: row.planted_at,
                deleted: false,
            },
        );
        Ok(())
    }

    fn delete_crop(&mut self, world: &str, pos: BlockPos) -> Result<(), StoreError> {
        let key = RegionKey::of(self.resolve(world)?, pos.chunk());
        if let Some(row) = self.rows_mut(key)?.get_mut(&pos) {
            row.deleted = true;
        }
        Ok(())
    }

    fn load_chunk(&mut self, world: &str, chunk: ChunkPos) -> Result<Vec<CropRow>, StoreError> {
        let key = RegionKey::of(self.resolve(world)?, chunk);
        Ok(self
            .rows(key)?
            .iter()
            .filter(|(pos, row)| !row.deleted && chunk.contains_column(pos.x, pos.z))
            .map(|(pos, row)| CropRow {
                pos: *pos,
                planted_at: row.planted_at,
            })
            .collect())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        while let Some((key, rows)) = self.dirty.pop_first() {
            let written = fs::create_dir_all(world_dir(&self.root, key.world))
                .map_err(StoreError::from)
                .and_then(|()| write_region_file(&region_path(&self.root, key), &rows));
            if let Err(err) = written {
                self.dirty.insert(key, rows);
                return Err(err);
            }
            self.regions.put(key, rows);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.commit()?;
        for key in self.region_keys_on_disk()? {
            let path = region_path(&self.root, key);
            let mut rows = read_region_file(&path)?;
            let before = rows.len();
            rows.retain(|_, row| !row.deleted);
            if rows.len() != before {
                if rows.is_empty() {
                    fs::remove_file(&path)?;
                } else {
                    write_region_file(&path, &rows)?;
                }
                debug!(path = %path.display(), purged = before - rows.len(), "purged deleted crops");
            }
        }
        self.regions.clear();
        Ok(())
    }
}
